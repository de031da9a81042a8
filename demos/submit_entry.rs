//! Journal entry submission example
//!
//! Builds a report of a scam phone call with identifier attachments, submits
//! it, and marks it complete.

use scambus::{ClientOptions, NewJournalEntry, ScambusClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let options = ClientOptions::builder()
        .base_url(scambus::DEFAULT_API_URL)
        .api_key(
            std::env::var("SCAMBUS_KEY_ID")?,
            std::env::var("SCAMBUS_KEY_SECRET")?,
        )
        .build()?;
    let client = ScambusClient::new(options)?;

    let entry = NewJournalEntry::new("phone_call", "Caller claimed to be my bank's fraud desk")
        .performed_at("2026-08-26T14:30:00Z")
        .identifier("phone", "+1-555-0100")
        .identifier("email", "support@definitely-your-bank.example")
        .details(serde_json::json!({ "duration_seconds": 340 }));

    let handle = client.submit_entry(entry).await?;
    println!("submitted entry {}", handle.entry().id);

    // The handle keeps the complete capability attached to the record.
    let completed = handle.complete().await?;
    println!("entry {} complete, {} identifiers extracted",
        completed.id,
        completed.identifiers.len());

    Ok(())
}
