//! Polling consumer example
//!
//! Drains a stream's message log page by page from the start of history.
//! Run with SCAMBUS_KEY_ID/SCAMBUS_KEY_SECRET set and a stream consumer key
//! as the first argument.

use scambus::{ClientOptions, Cursor, Poller, ScambusClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let stream_id = std::env::args()
        .nth(1)
        .expect("usage: poll_stream <consumer_key>");

    let options = ClientOptions::builder()
        .base_url(scambus::DEFAULT_API_URL)
        .api_key(
            std::env::var("SCAMBUS_KEY_ID")?,
            std::env::var("SCAMBUS_KEY_SECRET")?,
        )
        .build()?;
    let client = ScambusClient::new(options)?;

    // Start from the beginning of retained history; the poller owns the
    // cursor and advances it with every page.
    let mut poller = Poller::new(client, stream_id, Cursor::Start).with_limit(50);
    let mut total = 0usize;

    loop {
        let messages = poller.next_page().await?;
        total += messages.len();
        for message in messages {
            println!("{}", serde_json::to_string(&message)?);
        }
        if poller.drained() {
            break;
        }
    }

    println!("\ndrained {} messages, resume cursor: {}", total, poller.cursor());
    Ok(())
}
