//! # Scambus SDK
//!
//! A streaming-first Rust client for the Scambus fraud intelligence service.
//!
//! ## Overview
//!
//! Scambus collects fraud reports ("journal entries"), extracts the scammer
//! identifiers they mention (emails, phone numbers, wallets, handles), scores
//! them, and republishes everything as consumable streams. This SDK covers
//! the full client surface:
//!
//! - **Typed REST client**: cases, tags, journal entries, identifiers, media
//!   uploads, reports, and stream management with uniform cursor pagination
//! - **Polling consumer**: pull pages of a stream's message log at your own
//!   pace, with built-in remediation for rate limits and retention expiry
//! - **SSE consumer**: push delivery over a long-lived HTTP connection with
//!   heartbeat liveness checks and automatic reconnection
//! - **WebSocket consumer**: channel subscriptions with per-event handler
//!   registration, keepalive pings, and cursor replay across reconnects
//! - **Retry Logic**: exponential backoff with jitter on transient failures
//!
//! ## Two Consumption Modes
//!
//! ### 1. Polling (`poll_stream` / `Poller`)
//! For batch jobs and catch-up processing where the caller owns the cursor:
//!
//! ```rust,no_run
//! use scambus::{ScambusClient, ClientOptions, Cursor, Poller};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions::builder()
//!         .base_url("https://api.scambus.net")
//!         .api_key("key-id", "key-secret")
//!         .build()?;
//!     let client = ScambusClient::new(options)?;
//!
//!     let mut poller = Poller::new(client, "stream-abc", Cursor::Start).with_limit(50);
//!     loop {
//!         for message in poller.next_page().await? {
//!             println!("{:?}", message);
//!         }
//!         if poller.drained() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### 2. Live following (`follow_stream`)
//! For long-running consumers that want push delivery:
//!
//! ```rust,no_run
//! use scambus::{ScambusClient, ClientOptions, Cursor, SseOptions};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions::builder()
//!         .base_url("https://api.scambus.net")
//!         .api_key("key-id", "key-secret")
//!         .build()?;
//!     let client = ScambusClient::new(options)?;
//!
//!     let mut stream = client.follow_stream("stream-abc", Cursor::Tail, SseOptions::default());
//!     while let Some(message) = stream.next().await {
//!         println!("{:?}", message?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The SDK is organized into several modules, each with a specific responsibility:
//!
//! - **resources**: Typed REST surface (`ScambusClient`) and pagination
//! - **transport**: Authenticated HTTP, retry policy, and error mapping
//! - **poll**: Cursor-driven polling consumer
//! - **sse**: SSE consumer with reconnect state machine
//! - **ws**: WebSocket channel subscription client
//! - **cursor**: The cursor grammar shared by all three consumers
//! - **types**: Client options, records, and wire types
//! - **config**: Credential and endpoint resolution
//! - **error**: Error taxonomy and conversions
//! - **retry**: Exponential backoff engine shared by transport and consumers

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
// These modules are private (internal implementation details) unless explicitly
// re-exported through `pub use` statements below.

/// Credential schemes, environment variables, and config-file resolution.
mod config;

/// The cursor grammar: start-of-history, live tail, and message-id positions.
mod cursor;

/// Error types and conversions used across all public APIs.
mod error;

/// Cursor-driven polling consumer and its remediation loop.
mod poll;

/// Typed REST surface over the transport: cases, tags, entries, identifiers,
/// media, reports, and stream management.
mod resources;

/// SSE consumer: frame parsing, liveness, and the reconnect state machine.
mod sse;

/// Authenticated HTTP transport with retry and response mapping.
mod transport;

/// Client options, typed records, and the stream message wire types.
mod types;

/// WebSocket channel subscription client with handler registry and replay.
mod ws;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================
// These items form the public API of the SDK. Everything else is internal.

/// Retry utilities with exponential backoff and jitter.
/// Made public as a module so users can access retry configuration and
/// functions for their own operations that need retry logic.
pub mod retry;

// --- Core Client API ---

pub use resources::{JournalEntryHandle, NewJournalEntry, ScambusClient};

// --- Configuration ---

pub use config::{
    ConfigFile, Credentials, DEFAULT_API_URL, ENV_API_URL, ENV_KEY_ID, ENV_KEY_SECRET, ENV_TOKEN,
    resolve_api_url, resolve_credentials,
};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Stream Consumption ---

pub use cursor::Cursor;
pub use poll::{Poller, RetentionPolicy};
pub use sse::{SseOptions, SseStream, StopHandle};
pub use ws::{
    EventEnvelope, HandlerGuard, RESTART_CLOSE_CODE, SocketClient, SocketOptions, StreamHandler,
};

// --- Core Types ---

pub use types::{
    BackfillStatus, Case, ClientOptions, ClientOptionsBuilder, Identifier, IdentifierEvent,
    JournalEntry, JournalEntryEvent, MediaUpload, Page, PollOrder, PollRequest, PollResponse,
    Report, StreamInfo, StreamMessage, Tag,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types and functions.
/// Import with `use scambus::prelude::*;` to get everything you need for
/// typical usage.
///
/// This includes:
/// - Configuration: ClientOptions, ClientOptionsBuilder, Credentials
/// - Client: ScambusClient, NewJournalEntry
/// - Consumption: Cursor, Poller, SseOptions, SocketClient, SocketOptions,
///   StreamMessage, EventEnvelope
/// - Errors: Error, Result
pub mod prelude {
    pub use crate::{
        ClientOptions, ClientOptionsBuilder, Credentials, Cursor, Error, EventEnvelope,
        NewJournalEntry, Poller, PollRequest, PollResponse, Result, ScambusClient, SocketClient,
        SocketOptions, SseOptions, StreamHandler, StreamMessage,
    };
}
