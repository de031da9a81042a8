//! Integration tests for stream polling: chained cursor advancement and
//! retention-expiry remediation, against a mock server.

use mockito::Matcher;
use scambus::retry::RetryConfig;
use scambus::{
    ClientOptions, Cursor, Error, PollRequest, Poller, RetentionPolicy, ScambusClient,
    StreamMessage,
};
use std::time::Duration;

fn client_for(url: &str) -> ScambusClient {
    let options = ClientOptions::builder()
        .base_url(url)
        .bearer_token("tok")
        .retry(
            RetryConfig::new()
                .with_max_attempts(2)
                .with_initial_delay(Duration::from_millis(1)),
        )
        .build()
        .unwrap();
    ScambusClient::new(options).unwrap()
}

fn poll_query(cursor: &str, limit: u32) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("cursor".into(), cursor.into()),
        Matcher::UrlEncoded("order".into(), "asc".into()),
        Matcher::UrlEncoded("limit".into(), limit.to_string()),
    ])
}

fn identifier_message(cursor: &str) -> String {
    format!(
        r#"{{"identifier_id":"i-{cursor}","type":"phone","display_value":"+1-555-0100","confidence":0.8,"tags":[],"cursor":"{cursor}"}}"#
    )
}

#[tokio::test]
async fn chained_polls_advance_through_the_log() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/consume/s1/poll")
        .match_query(poll_query("0", 2))
        .with_status(200)
        .with_body(format!(
            r#"{{"messages":[{},{}],"next_cursor":"2000-0","has_more":true}}"#,
            identifier_message("1000-0"),
            identifier_message("2000-0"),
        ))
        .create_async()
        .await;
    server
        .mock("GET", "/consume/s1/poll")
        .match_query(poll_query("2000-0", 2))
        .with_status(200)
        .with_body(format!(
            r#"{{"messages":[{}],"next_cursor":"3000-0","has_more":false}}"#,
            identifier_message("3000-0"),
        ))
        .create_async()
        .await;

    let client = client_for(&server.url());
    let mut poller = Poller::new(client, "s1", Cursor::Start).with_limit(2);

    let first = poller.next_page().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].cursor(), Some("1000-0"));
    assert_eq!(first[1].cursor(), Some("2000-0"));
    assert_eq!(poller.cursor(), &Cursor::At("2000-0".to_string()));
    assert!(!poller.drained());

    let second = poller.next_page().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].cursor(), Some("3000-0"));
    assert_eq!(poller.cursor(), &Cursor::At("3000-0".to_string()));
    assert!(poller.drained());
}

#[tokio::test]
async fn expired_cursor_resets_to_start_and_resumes() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/consume/s1/poll")
        .match_query(poll_query("5000-0", 100))
        .with_status(410)
        .with_body(r#"{"error":"cursor outside retention window"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/consume/s1/poll")
        .match_query(poll_query("0", 100))
        .with_status(200)
        .with_body(format!(
            r#"{{"messages":[{}],"next_cursor":"6000-0","has_more":false}}"#,
            identifier_message("6000-0"),
        ))
        .create_async()
        .await;

    let client = client_for(&server.url());
    let mut poller = Poller::new(client, "s1", Cursor::At("5000-0".to_string()))
        .with_retention_policy(RetentionPolicy::ResetToStart);

    let messages = poller.next_page().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(poller.cursor(), &Cursor::At("6000-0".to_string()));
}

#[tokio::test]
async fn expired_cursor_surfaces_when_policy_says_so() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/consume/s1/poll")
        .match_query(poll_query("5000-0", 100))
        .with_status(416)
        .with_body(r#"{"error":"range not satisfiable"}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let mut poller = Poller::new(client, "s1", Cursor::At("5000-0".to_string()))
        .with_retention_policy(RetentionPolicy::Surface);

    let err = poller.next_page().await.unwrap_err();
    assert!(matches!(err, Error::RetentionExpired { status: 416 }));
}

#[tokio::test]
async fn one_shot_poll_discriminates_message_kinds() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/consume/s1/poll")
        .match_query(poll_query("0", 100))
        .with_status(200)
        .with_body(
            r#"{"messages":[
                {"identifier_id":"i1","type":"email","display_value":"a@b.c","cursor":"1-0"},
                {"id":"e1","type":"phone_call","description":"scam call","cursor":"2-0"}
            ],"next_cursor":"2-0","has_more":false}"#,
        )
        .create_async()
        .await;

    let client = client_for(&server.url());
    let page = client
        .poll_stream("s1", &PollRequest::default())
        .await
        .unwrap();

    assert_eq!(page.messages.len(), 2);
    assert!(matches!(page.messages[0], StreamMessage::Identifier(_)));
    assert!(matches!(page.messages[1], StreamMessage::JournalEntry(_)));
    assert_eq!(page.next_cursor.as_deref(), Some("2-0"));
}

#[tokio::test]
async fn stream_poll_410_is_not_retried_by_the_transport() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/consume/s1/poll")
        .match_query(Matcher::Any)
        .with_status(410)
        .with_body(r#"{"error":"gone"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let err = client
        .poll_stream("s1", &PollRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetentionExpired { status: 410 }));
    mock.assert_async().await;
}
