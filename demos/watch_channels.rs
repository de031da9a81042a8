//! WebSocket watch example
//!
//! Registers handlers on two channels, one exact and one wildcard, and
//! prints events until Ctrl+C. Subscriptions survive reconnects and resume
//! from the last-seen cursor automatically.

use scambus::{ClientOptions, Cursor, ScambusClient, SocketOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let channel = std::env::args()
        .nth(1)
        .expect("usage: watch_channels <channel>");

    let options = ClientOptions::builder()
        .base_url(scambus::DEFAULT_API_URL)
        .api_key(
            std::env::var("SCAMBUS_KEY_ID")?,
            std::env::var("SCAMBUS_KEY_SECRET")?,
        )
        .build()?;
    let client = ScambusClient::new(options)?;
    let socket = client.socket(SocketOptions::default())?;

    // Wildcard handler sees every event on the channel.
    let _all = socket.on_fn(&channel, "*", |envelope| async move {
        println!("[{}] {}: {}", envelope.channel, envelope.event, envelope.data);
        Ok(())
    });

    // Exact handlers fire in addition to the wildcard.
    let _created = socket.on_fn(&channel, "identifier.created", |envelope| async move {
        println!("new identifier: {}", envelope.data);
        Ok(())
    });

    let runner = socket.clone();
    let run = tokio::spawn(async move { runner.run().await });

    // Subscribe once the run loop has established the connection.
    let subscriber = socket.clone();
    let sub_channel = channel.clone();
    tokio::spawn(async move {
        loop {
            match subscriber.subscribe(&sub_channel, Cursor::Start).await {
                Ok(()) => break,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(200)).await,
            }
        }
    });

    println!("watching {} (Ctrl+C to stop)...", channel);
    tokio::signal::ctrl_c().await?;

    socket.stop();
    run.await??;
    println!("done");
    Ok(())
}
