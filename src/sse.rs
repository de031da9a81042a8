//! Server-sent-events consumer with automatic reconnection.
//!
//! SSE is the push-based counterpart to [`crate::poll`]: instead of the
//! caller pulling pages, the server holds one long-lived HTTP response open
//! on `GET /consume/{stream_id}/stream` and writes frames as messages arrive.
//! The consumer's job is threefold:
//!
//! 1. **Frame parsing.** The wire format is line-oriented: `event:` and
//!    `data:` fields accumulate until a blank line terminates the frame, and
//!    lines starting with `:` are comments. The server uses comment lines as
//!    heartbeats, so the parser must surface them rather than discard them -
//!    they are the liveness signal.
//!
//! 2. **Cursor bookkeeping.** Every delivered message that carries a
//!    `cursor` advances the resume position. When the connection drops, the
//!    consumer reconnects with that cursor, so a subscription that started
//!    at `$` (live tail) never re-requests `$` and never gaps across a
//!    reconnect.
//!
//! 3. **The reconnect state machine.** Connecting → Streaming (once the
//!    server's `connected` frame arrives) → Reconnecting (on any transport
//!    failure or heartbeat loss) → Connecting, with exponential backoff
//!    between attempts; Stopped only when the caller says so.
//!
//! # Example
//!
//! ```rust,no_run
//! # use scambus::{ScambusClient, ClientOptions, Cursor, SseOptions};
//! # use futures::StreamExt;
//! # async fn example() -> scambus::Result<()> {
//! # let client = ScambusClient::new(ClientOptions::builder()
//! #     .base_url("https://api.scambus.net").bearer_token("t").build()?)?;
//! let mut stream = client.follow_stream("stream-abc", Cursor::Tail, SseOptions::default());
//! while let Some(message) = stream.next().await {
//!     println!("{:?}", message?);
//! }
//! # Ok(())
//! # }
//! ```

use crate::cursor::Cursor;
use crate::resources::ScambusClient;
use crate::transport::Transport;
use crate::types::StreamMessage;
use crate::{Error, Result};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Fixed wait after a 429 while connecting, mirroring the polling consumer.
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);
/// Fixed wait while the server rebuilds the stream (503).
const REBUILD_WAIT: Duration = Duration::from_secs(10);
/// Granularity at which cancellable sleeps re-check the stop flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Cap on bytes buffered while waiting for a line terminator. No legitimate
/// frame comes anywhere near this; a server streaming this much without a
/// newline is broken.
const MAX_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Tuning knobs for the SSE consumer.
#[derive(Debug, Clone)]
pub struct SseOptions {
    /// Expected server heartbeat interval. The connection is declared dead
    /// after 2.5 times this interval with no bytes at all.
    pub heartbeat_interval: Duration,
    /// Capacity of the channel between the reader task and the consumer.
    pub channel_capacity: usize,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            channel_capacity: 64,
        }
    }
}

impl SseOptions {
    fn stale_after(&self) -> Duration {
        self.heartbeat_interval.mul_f64(2.5)
    }
}

/// Lifecycle of one SSE subscription.
///
/// `Stopped` is terminal and only ever entered through the caller's stop
/// handle; every failure path loops back through `Reconnecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Connecting,
    Streaming,
    Reconnecting,
    Stopped,
}

/// One parsed SSE frame: an optional event name and the joined data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseFrame {
    event: Option<String>,
    data: String,
}

/// What the parser produced from one terminated unit of input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParserItem {
    Frame(SseFrame),
    /// A `:`-prefixed comment line. Carries no data but proves liveness.
    Heartbeat,
}

/// Incremental SSE frame parser.
///
/// Bytes arrive in arbitrary chunks; the parser buffers until it has
/// complete lines, accumulates `event:`/`data:` fields, and emits a frame at
/// each blank line. `id:` and `retry:` fields are ignored. Multi-line data
/// is joined with `\n` per the SSE specification.
#[derive(Debug, Default)]
struct FrameParser {
    buffer: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl FrameParser {
    fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every frame and heartbeat it
    /// completed. Partial trailing lines stay buffered for the next chunk,
    /// up to [`MAX_BUFFER_BYTES`].
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<ParserItem>> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut items = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=newline).collect();
            line.truncate(line.trim_end_matches(&['\n', '\r'][..]).len());
            if let Some(item) = self.consume_line(&line) {
                items.push(item);
            }
        }
        if self.buffer.len() > MAX_BUFFER_BYTES {
            return Err(Error::protocol(format!(
                "sse line exceeded {} bytes without a terminator",
                MAX_BUFFER_BYTES
            )));
        }
        Ok(items)
    }

    fn consume_line(&mut self, line: &str) -> Option<ParserItem> {
        if line.is_empty() {
            // Blank line terminates the frame. A frame with neither event
            // nor data (e.g. after a lone comment) is not dispatched.
            if self.event.is_none() && self.data_lines.is_empty() {
                return None;
            }
            let frame = SseFrame {
                event: self.event.take(),
                data: self.data_lines.drain(..).collect::<Vec<_>>().join("\n"),
            };
            return Some(ParserItem::Frame(frame));
        }
        if let Some(rest) = line.strip_prefix(':') {
            debug!("sse heartbeat: {}", rest.trim_start());
            return Some(ParserItem::Heartbeat);
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            // A line without a colon is a field name with empty value.
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // id and retry are part of the SSE spec but unused by the server
            "id" | "retry" => {}
            other => debug!("ignoring unknown sse field {:?}", other),
        }
        None
    }
}

impl ScambusClient {
    /// Follow a stream over SSE, starting at `cursor`.
    ///
    /// Spawns a background reader task and returns an [`SseStream`] yielding
    /// `Result<StreamMessage>`. The task reconnects on failure and only
    /// exits when the stream is stopped or dropped, or on a non-recoverable
    /// error (which is delivered as the final item).
    pub fn follow_stream(
        &self,
        stream_id: impl Into<String>,
        cursor: Cursor,
        options: SseOptions,
    ) -> SseStream {
        let (sender, receiver) = mpsc::channel(options.channel_capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let consumer = SseConsumer {
            transport: self.transport().clone(),
            stream_id: stream_id.into(),
            options,
            stop: stop.clone(),
        };
        tokio::spawn(consumer.run(cursor, sender));
        SseStream {
            receiver: ReceiverStream::new(receiver),
            stop,
        }
    }
}

/// A stream of messages delivered over one SSE subscription.
///
/// Backed by a channel fed from the background reader task. Dropping the
/// stream (or calling [`SseStream::stop`]) shuts the task down; a stop
/// request taken mid-backoff does not wait out the remaining delay.
pub struct SseStream {
    receiver: ReceiverStream<Result<StreamMessage>>,
    stop: Arc<AtomicBool>,
}

impl SseStream {
    /// Request shutdown of the background reader task.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// A cloneable handle that can stop this stream from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: self.stop.clone(),
        }
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Stream for SseStream {
    type Item = Result<StreamMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// Stops an [`SseStream`] from outside the consuming task, e.g. a signal
/// handler.
#[derive(Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// The background half of an SSE subscription: owns the HTTP connection,
/// the reconnect loop, and the resume cursor.
struct SseConsumer {
    transport: Transport,
    stream_id: String,
    options: SseOptions,
    stop: Arc<AtomicBool>,
}

impl SseConsumer {
    async fn run(self, mut cursor: Cursor, sender: mpsc::Sender<Result<StreamMessage>>) {
        let mut state = ConnectionState::Connecting;
        let mut backoff = crate::retry::Backoff::for_reconnect();

        loop {
            if self.stopped() {
                state = ConnectionState::Stopped;
                break;
            }
            debug!("sse {}: connecting with cursor {}", self.stream_id, cursor);
            let path = format!("/consume/{}/stream", self.stream_id);
            let query = vec![
                ("cursor", cursor.as_query_value()),
                (
                    "include_test",
                    self.transport.options().include_test.to_string(),
                ),
            ];
            let response = match self
                .transport
                .get_raw_stream(&path, &query, "text/event-stream")
                .await
            {
                Ok(response) => response,
                Err(Error::RateLimited { retry_after }) => {
                    let wait = retry_after.map(Duration::from_secs).unwrap_or(RATE_LIMIT_WAIT);
                    info!("sse {}: rate limited, retrying in {:?}", self.stream_id, wait);
                    if !self.sleep_cancellable(wait).await {
                        state = ConnectionState::Stopped;
                        break;
                    }
                    continue;
                }
                Err(Error::Server { status: 503, .. }) => {
                    info!("sse {}: stream rebuilding, retrying in {:?}", self.stream_id, REBUILD_WAIT);
                    if !self.sleep_cancellable(REBUILD_WAIT).await {
                        state = ConnectionState::Stopped;
                        break;
                    }
                    continue;
                }
                Err(err) if Self::is_fatal(&err) => {
                    let _ = sender.send(Err(err)).await;
                    break;
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    warn!(
                        "sse {}: connect failed ({}), reconnecting in {:?}",
                        self.stream_id, err, delay
                    );
                    state = ConnectionState::Reconnecting;
                    if !self.sleep_cancellable(delay).await {
                        state = ConnectionState::Stopped;
                        break;
                    }
                    continue;
                }
            };

            match self
                .read_connection(response, &mut state, &mut backoff, &mut cursor, &sender)
                .await
            {
                ReadOutcome::Stopped => {
                    state = ConnectionState::Stopped;
                    break;
                }
                ReadOutcome::Reconnect => {
                    let delay = backoff.next_delay();
                    state = ConnectionState::Reconnecting;
                    info!(
                        "sse {}: connection lost, reconnecting in {:?} from cursor {}",
                        self.stream_id, delay, cursor
                    );
                    if !self.sleep_cancellable(delay).await {
                        state = ConnectionState::Stopped;
                        break;
                    }
                }
            }
        }
        debug!("sse {}: reader task exiting ({:?})", self.stream_id, state);
    }

    /// Drain one open connection until it dies, goes stale, or we are asked
    /// to stop.
    async fn read_connection(
        &self,
        response: reqwest::Response,
        state: &mut ConnectionState,
        backoff: &mut crate::retry::Backoff,
        cursor: &mut Cursor,
        sender: &mpsc::Sender<Result<StreamMessage>>,
    ) -> ReadOutcome {
        let mut parser = FrameParser::new();
        let mut body = response.bytes_stream();
        let stale_after = self.options.stale_after();

        loop {
            if self.stopped() {
                return ReadOutcome::Stopped;
            }
            // Any bytes at all (frames or heartbeat comments) reset the
            // liveness clock; silence beyond stale_after means the
            // connection is dead even if TCP has not noticed.
            let chunk = match tokio::time::timeout(stale_after, body.next()).await {
                Ok(Some(Ok(bytes))) => bytes,
                Ok(Some(Err(err))) => {
                    warn!("sse {}: read error: {}", self.stream_id, err);
                    return ReadOutcome::Reconnect;
                }
                Ok(None) => {
                    debug!("sse {}: server closed the connection", self.stream_id);
                    return ReadOutcome::Reconnect;
                }
                Err(_) => {
                    warn!(
                        "sse {}: no heartbeat within {:?}, dropping connection",
                        self.stream_id, stale_after
                    );
                    return ReadOutcome::Reconnect;
                }
            };

            let items = match parser.push(&chunk) {
                Ok(items) => items,
                Err(err) => {
                    warn!("sse {}: {}, dropping connection", self.stream_id, err);
                    return ReadOutcome::Reconnect;
                }
            };
            for item in items {
                let frame = match item {
                    ParserItem::Frame(frame) => frame,
                    ParserItem::Heartbeat => continue,
                };
                if !self.handle_frame(frame, state, backoff, cursor, sender).await {
                    return ReadOutcome::Stopped;
                }
            }
        }
    }

    /// Dispatch one frame. Returns false when the receiver is gone and the
    /// task should stop.
    async fn handle_frame(
        &self,
        frame: SseFrame,
        state: &mut ConnectionState,
        backoff: &mut crate::retry::Backoff,
        cursor: &mut Cursor,
        sender: &mpsc::Sender<Result<StreamMessage>>,
    ) -> bool {
        match frame.event.as_deref() {
            Some("connected") => {
                info!("sse {}: connected", self.stream_id);
                *state = ConnectionState::Streaming;
                backoff.reset();
                true
            }
            Some("batch") => {
                let messages: Vec<StreamMessage> = match serde_json::from_str(&frame.data) {
                    Ok(messages) => messages,
                    Err(err) => {
                        warn!("sse {}: unparseable batch, skipping: {}", self.stream_id, err);
                        return true;
                    }
                };
                for message in messages {
                    if !self.deliver(message, cursor, sender).await {
                        return false;
                    }
                }
                true
            }
            // The server tags single messages "message"; a frame without an
            // event name defaults to the same per the SSE specification.
            Some("message") | None => {
                let message: StreamMessage = match serde_json::from_str(&frame.data) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!("sse {}: unparseable message, skipping: {}", self.stream_id, err);
                        return true;
                    }
                };
                self.deliver(message, cursor, sender).await
            }
            Some("error") => {
                warn!("sse {}: server error event: {}", self.stream_id, frame.data);
                true
            }
            Some(other) => {
                debug!("sse {}: ignoring event {:?}", self.stream_id, other);
                true
            }
        }
    }

    async fn deliver(
        &self,
        message: StreamMessage,
        cursor: &mut Cursor,
        sender: &mpsc::Sender<Result<StreamMessage>>,
    ) -> bool {
        if let Some(id) = message.cursor() {
            // Only store well-formed ids; a bad cursor would poison every
            // future reconnect.
            match id.parse() {
                Ok(parsed) => *cursor = parsed,
                Err(_) => warn!("sse {}: ignoring malformed cursor {:?}", self.stream_id, id),
            }
        }
        sender.send(Ok(message)).await.is_ok()
    }

    /// Errors reconnecting cannot fix.
    fn is_fatal(err: &Error) -> bool {
        matches!(
            err,
            Error::Authentication(_)
                | Error::Validation(_)
                | Error::NotFound(_)
                | Error::Config(_)
                | Error::RetentionExpired { .. }
        )
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if the stop flag is raised.
    /// Returns false when stopped.
    async fn sleep_cancellable(&self, duration: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + duration;
        while tokio::time::Instant::now() < deadline {
            if self.stopped() {
                return false;
            }
            let remaining = deadline - tokio::time::Instant::now();
            tokio::time::sleep(remaining.min(STOP_POLL_INTERVAL)).await;
        }
        !self.stopped()
    }
}

enum ReadOutcome {
    Reconnect,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientOptions;

    fn frames(parser: &mut FrameParser, input: &str) -> Vec<ParserItem> {
        parser.push(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_parser_single_frame() {
        let mut parser = FrameParser::new();
        let items = frames(&mut parser, "event: message\ndata: {\"id\":\"e1\"}\n\n");
        assert_eq!(
            items,
            vec![ParserItem::Frame(SseFrame {
                event: Some("message".to_string()),
                data: "{\"id\":\"e1\"}".to_string(),
            })]
        );
    }

    #[test]
    fn test_parser_multiline_data_joined_with_newline() {
        let mut parser = FrameParser::new();
        let items = frames(&mut parser, "data: line one\ndata: line two\n\n");
        assert_eq!(
            items,
            vec![ParserItem::Frame(SseFrame {
                event: None,
                data: "line one\nline two".to_string(),
            })]
        );
    }

    #[test]
    fn test_parser_comment_is_heartbeat() {
        let mut parser = FrameParser::new();
        let items = frames(&mut parser, ": keep-alive\n");
        assert_eq!(items, vec![ParserItem::Heartbeat]);
    }

    #[test]
    fn test_parser_partial_chunks_buffer() {
        let mut parser = FrameParser::new();
        assert!(frames(&mut parser, "event: bat").is_empty());
        assert!(frames(&mut parser, "ch\ndata: [").is_empty());
        let items = frames(&mut parser, "]\n\n");
        assert_eq!(
            items,
            vec![ParserItem::Frame(SseFrame {
                event: Some("batch".to_string()),
                data: "[]".to_string(),
            })]
        );
    }

    #[test]
    fn test_parser_crlf_lines() {
        let mut parser = FrameParser::new();
        let items = frames(&mut parser, "data: x\r\n\r\n");
        assert_eq!(
            items,
            vec![ParserItem::Frame(SseFrame {
                event: None,
                data: "x".to_string(),
            })]
        );
    }

    #[test]
    fn test_parser_blank_line_without_fields_emits_nothing() {
        let mut parser = FrameParser::new();
        assert!(frames(&mut parser, "\n\n\n").is_empty());
    }

    #[test]
    fn test_parser_ignores_id_and_retry() {
        let mut parser = FrameParser::new();
        let items = frames(&mut parser, "id: 7\nretry: 3000\ndata: x\n\n");
        assert_eq!(
            items,
            vec![ParserItem::Frame(SseFrame {
                event: None,
                data: "x".to_string(),
            })]
        );
    }

    #[test]
    fn test_parser_rejects_unterminated_line_overflow() {
        let mut parser = FrameParser::new();
        let chunk = vec![b'x'; MAX_BUFFER_BYTES + 1];
        let err = parser.push(&chunk).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        // Terminated lines drain the buffer no matter how much total data
        // flows through.
        let mut parser = FrameParser::new();
        let line = format!("data: {}\n\n", "y".repeat(1024));
        for _ in 0..8 {
            assert_eq!(parser.push(line.as_bytes()).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SseConsumer::is_fatal(&Error::authentication("bad key")));
        assert!(SseConsumer::is_fatal(&Error::RetentionExpired { status: 410 }));
        assert!(!SseConsumer::is_fatal(&Error::Timeout));
        assert!(!SseConsumer::is_fatal(&Error::Server {
            status: 502,
            body: "bad gateway".to_string(),
        }));
    }

    #[test]
    fn test_default_options() {
        let options = SseOptions::default();
        assert_eq!(options.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(options.stale_after(), Duration::from_millis(37_500));
    }

    #[tokio::test]
    async fn test_delivered_cursor_advances_resume_position() {
        let options = ClientOptions::builder()
            .base_url("https://api.scambus.net")
            .bearer_token("t")
            .build()
            .unwrap();
        let consumer = SseConsumer {
            transport: Transport::new(options).unwrap(),
            stream_id: "s1".to_string(),
            options: SseOptions::default(),
            stop: Arc::new(AtomicBool::new(false)),
        };
        let (sender, mut receiver) = mpsc::channel(8);
        let mut state = ConnectionState::Connecting;
        let mut backoff = crate::retry::Backoff::for_reconnect();
        // A subscription opened at the live tail must resume from the last
        // delivered message's cursor, never from `$` again.
        let mut cursor = Cursor::Tail;

        let single = SseFrame {
            event: Some("message".to_string()),
            data: r#"{"id":"je-1","type":"report","cursor":"1000-0"}"#.to_string(),
        };
        assert!(
            consumer
                .handle_frame(single, &mut state, &mut backoff, &mut cursor, &sender)
                .await
        );
        assert_eq!(cursor, Cursor::At("1000-0".to_string()));

        // Batch replay advances through each message in array order.
        let batch = SseFrame {
            event: Some("batch".to_string()),
            data: concat!(
                r#"[{"id":"je-2","type":"report","cursor":"2000-0"},"#,
                r#"{"id":"je-3","type":"report","cursor":"3000-0"}]"#
            )
            .to_string(),
        };
        assert!(
            consumer
                .handle_frame(batch, &mut state, &mut backoff, &mut cursor, &sender)
                .await
        );
        assert_eq!(cursor, Cursor::At("3000-0".to_string()));

        // A malformed cursor is ignored rather than poisoning resume state.
        let malformed = SseFrame {
            event: Some("message".to_string()),
            data: r#"{"id":"je-4","type":"report","cursor":"latest"}"#.to_string(),
        };
        assert!(
            consumer
                .handle_frame(malformed, &mut state, &mut backoff, &mut cursor, &sender)
                .await
        );
        assert_eq!(cursor, Cursor::At("3000-0".to_string()));

        let mut delivered = 0;
        while let Ok(message) = receiver.try_recv() {
            message.unwrap();
            delivered += 1;
        }
        assert_eq!(delivered, 4);
    }

    #[test]
    fn test_stream_yields_delivered_messages_then_ends() {
        let (sender, receiver) = mpsc::channel(4);
        let mut stream = SseStream {
            receiver: ReceiverStream::new(receiver),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let message: StreamMessage = serde_json::from_str(
            r#"{"identifier_id":"i1","type":"email","display_value":"a@b.c","cursor":"1-0"}"#,
        )
        .unwrap();
        sender.try_send(Ok(message.clone())).unwrap();
        drop(sender);

        tokio_test::block_on(async {
            assert_eq!(stream.next().await.unwrap().unwrap(), message);
            assert!(stream.next().await.is_none());
        });
    }
}
