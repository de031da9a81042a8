//! SSE follow example
//!
//! Subscribes to a stream at the live tail and prints messages as they
//! arrive. The consumer reconnects on its own; Ctrl+C stops it cleanly.

use futures::StreamExt;
use scambus::{ClientOptions, Cursor, ScambusClient, SseOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let stream_id = std::env::args()
        .nth(1)
        .expect("usage: follow_stream <consumer_key>");

    let options = ClientOptions::builder()
        .base_url(scambus::DEFAULT_API_URL)
        .api_key(
            std::env::var("SCAMBUS_KEY_ID")?,
            std::env::var("SCAMBUS_KEY_SECRET")?,
        )
        .build()?;
    let client = ScambusClient::new(options)?;

    // `$` means "only messages published after this subscription". After a
    // reconnect the consumer resumes from the last-seen cursor instead, so
    // nothing is skipped.
    let mut messages = client.follow_stream(&stream_id, Cursor::Tail, SseOptions::default());
    let stop = messages.stop_handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        stop.stop();
    });

    println!("following {} (Ctrl+C to stop)...", stream_id);
    while let Some(message) = messages.next().await {
        match message {
            Ok(message) => println!("{}", serde_json::to_string(&message)?),
            Err(err) => {
                eprintln!("stream failed: {}", err);
                break;
            }
        }
    }

    println!("done");
    Ok(())
}
