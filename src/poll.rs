//! Cursor-driven polling consumer.
//!
//! Polling is the simplest of the three consumption modes: each call pulls
//! one page of a stream's buffered message log and the caller owns the
//! cursor. The no-gap guarantee holds only for chained ascending polls -
//! repeatedly calling with the previous call's `next_cursor` and
//! `order=asc` never skips a message that was in the log at the time of the
//! first call, though it may redeliver one if your own last-applied
//! bookkeeping lags the returned cursor.
//!
//! # One-shot call
//!
//! ```rust,no_run
//! # use scambus::{ScambusClient, ClientOptions, PollRequest};
//! # async fn example() -> scambus::Result<()> {
//! # let client = ScambusClient::new(ClientOptions::builder()
//! #     .base_url("https://api.scambus.net").bearer_token("t").build()?)?;
//! let page = client.poll_stream("stream-abc", &PollRequest::default()).await?;
//! println!("{} messages, next cursor {:?}", page.messages.len(), page.next_cursor);
//! # Ok(())
//! # }
//! ```
//!
//! # Robust loop
//!
//! [`Poller`] wraps the status-code remediation every robust caller needs:
//! 410/416 mean the cursor fell out of retention (reset or surface,
//! per [`RetentionPolicy`]), 429 backs off for a fixed long wait, 503 means
//! the stream is rebuilding and retries after a short wait. Anything else
//! propagates.

use crate::cursor::Cursor;
use crate::resources::ScambusClient;
use crate::transport::RequestOptions;
use crate::types::{PollRequest, PollResponse, StreamMessage};
use crate::{Error, Result};
use log::{info, warn};
use std::time::Duration;

/// Fixed wait after a 429 before retrying with the same cursor
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);
/// Fixed wait while the server rebuilds the stream (503)
const REBUILD_WAIT: Duration = Duration::from_secs(10);
/// Idle wait between polls once the log is drained, in follow mode
const DRAINED_WAIT: Duration = Duration::from_secs(5);

impl ScambusClient {
    /// Poll one page of a stream's message log.
    ///
    /// `GET /consume/{stream_id}/poll?cursor=&order=&limit=`. 410/416 map to
    /// [`Error::RetentionExpired`]; no local retry happens here - remediation
    /// belongs to the caller (or to [`Poller`]).
    pub async fn poll_stream(
        &self,
        stream_id: &str,
        request: &PollRequest,
    ) -> Result<PollResponse> {
        let query = vec![
            ("cursor", request.cursor.as_query_value()),
            ("order", request.order.as_str().to_string()),
            ("limit", request.limit.to_string()),
        ];
        let value = self
            .transport()
            .request(
                reqwest::Method::GET,
                &format!("/consume/{}/poll", stream_id),
                &query,
                None,
                &RequestOptions::stream_consumption(),
            )
            .await?;
        serde_json::from_value(value).map_err(Error::Json)
    }
}

/// What to do when the server reports the cursor fell out of retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Reset to `"0"` and resume from the beginning of retained history.
    /// Accepts that messages between the stale cursor and the retention
    /// horizon are lost.
    #[default]
    ResetToStart,
    /// Surface [`Error::RetentionExpired`] to the caller.
    Surface,
}

/// A chained polling loop that owns its cursor and absorbs the transient
/// failure modes of stream consumption.
///
/// The poller only locally absorbs rate limiting, stream rebuilds, and
/// (under [`RetentionPolicy::ResetToStart`]) retention expiry; every other
/// error propagates untouched.
pub struct Poller {
    client: ScambusClient,
    stream_id: String,
    request: PollRequest,
    retention_policy: RetentionPolicy,
    drained: bool,
}

impl Poller {
    /// Create a poller starting at `cursor` with ascending order.
    pub fn new(client: ScambusClient, stream_id: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            client,
            stream_id: stream_id.into(),
            request: PollRequest {
                cursor,
                ..Default::default()
            },
            retention_policy: RetentionPolicy::default(),
            drained: false,
        }
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.request.limit = limit;
        self
    }

    /// Set the retention remediation policy.
    pub fn with_retention_policy(mut self, policy: RetentionPolicy) -> Self {
        self.retention_policy = policy;
        self
    }

    /// The cursor the next poll will use.
    pub fn cursor(&self) -> &Cursor {
        &self.request.cursor
    }

    /// Whether the last page reported the log as drained (`has_more: false`).
    pub fn drained(&self) -> bool {
        self.drained
    }

    /// Fetch the next page, advancing the cursor past it.
    ///
    /// Retries internally on 429 (60s), 503 (10s), and - with
    /// [`RetentionPolicy::ResetToStart`] - on retention expiry.
    pub async fn next_page(&mut self) -> Result<Vec<StreamMessage>> {
        loop {
            match self.client.poll_stream(&self.stream_id, &self.request).await {
                Ok(page) => {
                    if let Some(next) = &page.next_cursor {
                        // The server's next_cursor is a literal message id;
                        // anything else would break resume, so parse it
                        // rather than storing it blindly.
                        self.request.cursor = next.parse()?;
                    }
                    self.drained = !page.has_more;
                    return Ok(page.messages);
                }
                Err(Error::RetentionExpired { status }) => match self.retention_policy {
                    RetentionPolicy::ResetToStart => {
                        warn!(
                            "cursor {} outside retention window (status {}); resetting to \"0\"",
                            self.request.cursor, status
                        );
                        self.request.cursor = Cursor::Start;
                    }
                    RetentionPolicy::Surface => {
                        return Err(Error::RetentionExpired { status });
                    }
                },
                Err(Error::RateLimited { retry_after }) => {
                    let wait = retry_after.map(Duration::from_secs).unwrap_or(RATE_LIMIT_WAIT);
                    info!("rate limited; waiting {:?} before re-polling", wait);
                    tokio::time::sleep(wait).await;
                }
                Err(Error::Server { status: 503, .. }) => {
                    info!("stream rebuilding; waiting {:?}", REBUILD_WAIT);
                    tokio::time::sleep(REBUILD_WAIT).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Wait out the idle interval between polls once the log is drained.
    ///
    /// Call this between [`Self::next_page`] calls in a follow loop; it is a
    /// no-op while the log still has more pages.
    pub async fn idle(&self) {
        if self.drained {
            tokio::time::sleep(DRAINED_WAIT).await;
        }
    }
}
