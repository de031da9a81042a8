//! WebSocket channel subscription client.
//!
//! The WebSocket surface multiplexes many channels over a single socket.
//! Clients subscribe to channels with a resume cursor, register handlers per
//! `(channel, event)` pair, and the [`SocketClient`] run loop takes care of
//! keepalive pings, reconnection, and subscription replay.
//!
//! # Wire protocol
//!
//! Outbound frames are JSON text:
//!
//! ```text
//! {"action": "subscribe", "channel": "stream:abc", "cursor": "0-0"}
//! {"action": "unsubscribe", "channel": "stream:abc"}
//! ```
//!
//! Inbound frames carry `{type, channel, event, data}`. The reserved
//! `{"type": "connected", "data": {"connectionId": ...}}` frame confirms the
//! session and is logged rather than dispatched.
//!
//! # Example
//!
//! ```rust,no_run
//! # use scambus::{ScambusClient, ClientOptions, Cursor, SocketOptions};
//! # async fn example() -> scambus::Result<()> {
//! # let client = ScambusClient::new(ClientOptions::builder()
//! #     .base_url("https://api.scambus.net").bearer_token("t").build()?)?;
//! let socket = client.socket(SocketOptions::default())?;
//! let _guard = socket.on_fn("stream:abc", "*", |envelope| async move {
//!     println!("{} {}: {}", envelope.channel, envelope.event, envelope.data);
//!     Ok(())
//! });
//! let runner = socket.clone();
//! tokio::spawn(async move { runner.run().await });
//! // subscribe once the connection is up
//! # Ok(())
//! # }
//! ```

use crate::config::Credentials;
use crate::cursor::Cursor;
use crate::resources::ScambusClient;
use crate::retry::Backoff;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Granularity at which cancellable sleeps re-check the stop flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Close code the server sends when it is restarting. Reconnecting
/// immediately is expected, so it resets the backoff counter.
pub const RESTART_CLOSE_CODE: u16 = 4001;

/// Tuning knobs for the WebSocket client.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Interval between protocol pings.
    pub ping_interval: Duration,
    /// How long to wait for a pong before declaring the connection dead.
    pub pong_timeout: Duration,
    /// Close code treated as a server restart signal.
    pub restart_close_code: u16,
    /// Capacity of the outbound frame queue.
    pub send_capacity: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            restart_close_code: RESTART_CLOSE_CODE,
            send_capacity: 64,
        }
    }
}

/// One event delivered on a channel the client is subscribed to.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub channel: String,
    pub event: String,
    pub data: serde_json::Value,
}

/// Inbound frame as the server writes it.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// Receives events for a `(channel, event)` registration.
///
/// Handler failures are logged and never interrupt dispatch to other
/// handlers or the read loop.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn handle(&self, envelope: EventEnvelope) -> Result<()>;
}

/// Adapts a plain async closure into a [`StreamHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> StreamHandler for FnHandler<F>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, envelope: EventEnvelope) -> Result<()> {
        (self.0)(envelope).await
    }
}

struct Registration {
    id: u64,
    handler: Arc<dyn StreamHandler>,
}

type Registry = HashMap<(String, String), Vec<Registration>>;

/// How one driven connection ended.
enum SessionEnd {
    Stopped,
    Restart,
    Reconnect,
}

/// Commands the run loop accepts from other tasks.
enum Command {
    Frame(String),
    Shutdown,
}

/// Shared mutable state of one socket client.
struct SocketShared {
    registry: Mutex<Registry>,
    /// channel -> last-seen cursor, replayed on every reconnect.
    subscriptions: Mutex<HashMap<String, Cursor>>,
    /// Present only while a connection is established.
    commands: Mutex<Option<mpsc::Sender<Command>>>,
    stop: AtomicBool,
    next_registration_id: AtomicU64,
}

/// A channel subscription client over one WebSocket connection.
///
/// Cheaply cloneable; all clones share the same registry, subscriptions, and
/// connection. One clone drives [`SocketClient::run`] while others register
/// handlers and subscribe.
#[derive(Clone)]
pub struct SocketClient {
    url: Url,
    credentials: Credentials,
    options: SocketOptions,
    shared: Arc<SocketShared>,
}

impl ScambusClient {
    /// Build a WebSocket client against this client's API endpoint.
    ///
    /// The socket URL is derived from the REST base URL: `https` becomes
    /// `wss`, `http` becomes `ws`, path `/ws`.
    pub fn socket(&self, options: SocketOptions) -> Result<SocketClient> {
        let base = &self.transport().options().base_url;
        let mut url = Url::parse(base)
            .map_err(|err| Error::config(format!("invalid base URL {:?}: {}", base, err)))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(Error::config(format!(
                    "cannot derive socket URL from scheme {:?}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::config("cannot derive socket URL"))?;
        url.set_path("/ws");
        Ok(SocketClient {
            url,
            credentials: self.transport().options().credentials.clone(),
            options,
            shared: Arc::new(SocketShared {
                registry: Mutex::new(HashMap::new()),
                subscriptions: Mutex::new(HashMap::new()),
                commands: Mutex::new(None),
                stop: AtomicBool::new(false),
                next_registration_id: AtomicU64::new(1),
            }),
        })
    }
}

impl SocketClient {
    /// Register a handler for `(channel, event)`. Event `"*"` receives every
    /// event on the channel.
    ///
    /// The returned guard de-registers the handler when dropped.
    pub fn on(
        &self,
        channel: impl Into<String>,
        event: impl Into<String>,
        handler: impl StreamHandler + 'static,
    ) -> HandlerGuard {
        let key = (channel.into(), event.into());
        let id = self.shared.next_registration_id.fetch_add(1, Ordering::SeqCst);
        let mut registry = self.lock_registry();
        registry.entry(key.clone()).or_default().push(Registration {
            id,
            handler: Arc::new(handler),
        });
        HandlerGuard {
            shared: self.shared.clone(),
            key,
            id,
        }
    }

    /// Register a plain async closure as a handler.
    pub fn on_fn<F, Fut>(
        &self,
        channel: impl Into<String>,
        event: impl Into<String>,
        handler: F,
    ) -> HandlerGuard
    where
        F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(channel, event, FnHandler(handler))
    }

    /// Subscribe to a channel starting at `cursor`.
    ///
    /// Fails with [`Error::Stream`] before the connection is established.
    /// The subscription survives reconnects: it is replayed with the
    /// last-seen cursor, not the one given here.
    pub async fn subscribe(&self, channel: impl Into<String>, cursor: Cursor) -> Result<()> {
        let channel = channel.into();
        let frame = subscribe_frame(&channel, &cursor);
        self.send_frame(frame).await?;
        // Recorded for replay only once the frame is accepted; a failed call
        // leaves the replay table untouched.
        self.lock_subscriptions().insert(channel, cursor);
        Ok(())
    }

    /// Unsubscribe from a channel and forget its cursor.
    pub async fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.lock_subscriptions().remove(channel);
        let frame = json!({ "action": "unsubscribe", "channel": channel }).to_string();
        self.send_frame(frame).await
    }

    /// Request shutdown of the run loop.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        let sender = self.lock_commands().clone();
        if let Some(sender) = sender {
            let _ = sender.try_send(Command::Shutdown);
        }
    }

    /// Drive the connection until [`SocketClient::stop`] is called.
    ///
    /// Owns the socket: connects, replays subscriptions, dispatches inbound
    /// events, sends pings, and reconnects with exponential backoff. A close
    /// with the restart close code reconnects immediately and resets the
    /// backoff. Returns an error only for failures reconnecting cannot fix.
    pub async fn run(&self) -> Result<()> {
        let mut backoff = Backoff::for_reconnect();
        loop {
            if self.stopped() {
                return Ok(());
            }
            match self.connect_once().await {
                Ok(socket) => match self.drive(socket, &mut backoff).await {
                    SessionEnd::Stopped => return Ok(()),
                    SessionEnd::Restart => {
                        info!("ws: server restart signalled, reconnecting immediately");
                        backoff.reset();
                        continue;
                    }
                    SessionEnd::Reconnect => {}
                },
                Err(err) => {
                    warn!("ws: connect failed: {}", err);
                }
            }
            *self.lock_commands() = None;
            let delay = backoff.next_delay();
            info!("ws: reconnecting in {:?}", delay);
            if !self.sleep_cancellable(delay).await {
                return Ok(());
            }
        }
    }

    async fn connect_once(
        &self,
    ) -> Result<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    > {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| Error::stream(format!("invalid socket URL: {}", err)))?;
        let (name, value) = self.credentials.header();
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::stream(format!("invalid auth header: {}", err)))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|err| Error::stream(format!("invalid auth header value: {}", err)))?;
        request.headers_mut().insert(name, value);

        debug!("ws: connecting to {}", self.url);
        let (socket, _response) = connect_async(request)
            .await
            .map_err(|err| Error::stream(format!("websocket connect failed: {}", err)))?;
        Ok(socket)
    }

    /// Drive one established connection to its end.
    async fn drive(
        &self,
        socket: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        backoff: &mut Backoff,
    ) -> SessionEnd {
        let (mut writer, mut reader) = socket.split();

        // Replay every known subscription from its last-seen cursor.
        let replay: Vec<String> = self
            .lock_subscriptions()
            .iter()
            .map(|(channel, cursor)| subscribe_frame(channel, cursor))
            .collect();
        for frame in replay {
            if let Err(err) = writer.send(Message::Text(frame)).await {
                warn!("ws: subscription replay failed: {}", err);
                return SessionEnd::Reconnect;
            }
        }

        let (command_tx, mut command_rx) = mpsc::channel(self.options.send_capacity);
        *self.lock_commands() = Some(command_tx);
        info!("ws: connected");
        backoff.reset();

        let mut ping_interval = tokio::time::interval(self.options.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; skip it so pings start one
        // interval after connect.
        ping_interval.tick().await;
        let mut pong_deadline: Option<tokio::time::Instant> = None;

        loop {
            if self.stopped() {
                let _ = writer.send(Message::Close(None)).await;
                return SessionEnd::Stopped;
            }
            let deadline = pong_deadline;
            let pong_overdue = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                frame = reader.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = writer.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return self.classify_close(frame);
                    }
                    Some(Ok(_)) => {
                        // binary and raw frames are not part of the protocol
                    }
                    Some(Err(err)) => {
                        warn!("ws: read error: {}", err);
                        return SessionEnd::Reconnect;
                    }
                    None => {
                        debug!("ws: server closed the connection");
                        return SessionEnd::Reconnect;
                    }
                },
                command = command_rx.recv() => match command {
                    Some(Command::Frame(frame)) => {
                        if let Err(err) = writer.send(Message::Text(frame)).await {
                            warn!("ws: send failed: {}", err);
                            return SessionEnd::Reconnect;
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = writer.send(Message::Close(None)).await;
                        return SessionEnd::Stopped;
                    }
                },
                _ = ping_interval.tick() => {
                    if let Err(err) = writer.send(Message::Ping(Vec::new())).await {
                        warn!("ws: ping failed: {}", err);
                        return SessionEnd::Reconnect;
                    }
                    pong_deadline =
                        Some(tokio::time::Instant::now() + self.options.pong_timeout);
                }
                _ = pong_overdue => {
                    warn!(
                        "ws: no pong within {:?}, dropping connection",
                        self.options.pong_timeout
                    );
                    return SessionEnd::Reconnect;
                }
            }
        }
    }

    fn classify_close(&self, frame: Option<CloseFrame<'_>>) -> SessionEnd {
        if let Some(frame) = &frame {
            debug!("ws: close frame {} {:?}", u16::from(frame.code), frame.reason);
            if u16::from(frame.code) == self.options.restart_close_code {
                return SessionEnd::Restart;
            }
        }
        SessionEnd::Reconnect
    }

    async fn handle_text(&self, text: &str) {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("ws: unparseable frame, skipping: {}", err);
                return;
            }
        };
        if frame.frame_type == "connected" {
            info!("ws: session confirmed: {}", frame.data);
            return;
        }
        let (channel, event) = match (frame.channel, frame.event) {
            (Some(channel), Some(event)) => (channel, event),
            _ => {
                warn!("ws: frame of type {:?} without channel/event", frame.frame_type);
                return;
            }
        };

        // Track resume position for the channel before dispatching.
        if let Some(id) = frame.data.get("cursor").and_then(|v| v.as_str()) {
            match id.parse::<Cursor>() {
                Ok(cursor) => {
                    self.lock_subscriptions()
                        .entry(channel.clone())
                        .and_modify(|c| *c = cursor);
                }
                Err(_) => warn!("ws: ignoring malformed cursor {:?} on {}", id, channel),
            }
        }

        let envelope = EventEnvelope {
            channel,
            event,
            data: frame.data,
        };
        self.dispatch(envelope).await;
    }

    /// Snapshot matching handlers under the lock, then call them without it,
    /// so handlers may register or unregister freely.
    async fn dispatch(&self, envelope: EventEnvelope) {
        let handlers: Vec<Arc<dyn StreamHandler>> = {
            let registry = self.lock_registry();
            let exact = (envelope.channel.clone(), envelope.event.clone());
            let wildcard = (envelope.channel.clone(), "*".to_string());
            registry
                .get(&exact)
                .into_iter()
                .chain(registry.get(&wildcard))
                .flatten()
                .map(|registration| registration.handler.clone())
                .collect()
        };
        if handlers.is_empty() {
            debug!(
                "ws: no handler for {} {}, dropping event",
                envelope.channel, envelope.event
            );
            return;
        }
        for handler in handlers {
            if let Err(err) = handler.handle(envelope.clone()).await {
                warn!(
                    "ws: handler error on {} {}: {}",
                    envelope.channel, envelope.event, err
                );
            }
        }
    }

    async fn send_frame(&self, frame: String) -> Result<()> {
        let sender = self
            .lock_commands()
            .clone()
            .ok_or_else(|| Error::stream("socket is not connected"))?;
        sender
            .send(Command::Frame(frame))
            .await
            .map_err(|_| Error::stream("socket is shutting down"))
    }

    fn stopped(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

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

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        match self.shared.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Cursor>> {
        match self.shared.subscriptions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_commands(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<Command>>> {
        match self.shared.commands.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn subscribe_frame(channel: &str, cursor: &Cursor) -> String {
    json!({
        "action": "subscribe",
        "channel": channel,
        "cursor": cursor.as_subscribe_value(),
    })
    .to_string()
}

/// De-registers its handler when dropped.
///
/// Call [`HandlerGuard::forget`] to leave the handler registered for the
/// life of the client.
pub struct HandlerGuard {
    shared: Arc<SocketShared>,
    key: (String, String),
    id: u64,
}

impl HandlerGuard {
    /// Keep the handler registered forever.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        let mut registry = match self.shared.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(registrations) = registry.get_mut(&self.key) {
            registrations.retain(|registration| registration.id != self.id);
            if registrations.is_empty() {
                registry.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientOptions;

    fn client() -> ScambusClient {
        ScambusClient::new(
            ClientOptions::builder()
                .base_url("https://api.scambus.net")
                .bearer_token("token")
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_socket_url_derivation() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        assert_eq!(socket.url.as_str(), "wss://api.scambus.net/ws");
    }

    #[test]
    fn test_subscribe_frame_spells_start_as_zero_zero() {
        let frame = subscribe_frame("stream:abc", &Cursor::Start);
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["action"], "subscribe");
        assert_eq!(value["channel"], "stream:abc");
        assert_eq!(value["cursor"], "0-0");
    }

    #[test]
    fn test_subscribe_frame_tail_and_resume() {
        let frame = subscribe_frame("c", &Cursor::Tail);
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["cursor"], "$");

        let frame = subscribe_frame("c", &Cursor::At("1700000000000-5".to_string()));
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["cursor"], "1700000000000-5");
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_is_an_error() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        let err = socket.subscribe("stream:abc", Cursor::Start).await.unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
        // The failed call must not schedule the channel for replay on the
        // next connect.
        assert!(socket.lock_subscriptions().is_empty());
    }

    #[test]
    fn test_handler_guard_unregisters_on_drop() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        let guard = socket.on_fn("c", "e", |_| async { Ok(()) });
        assert_eq!(socket.lock_registry().len(), 1);
        drop(guard);
        assert!(socket.lock_registry().is_empty());
    }

    #[test]
    fn test_handler_guard_removes_only_its_own_registration() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        let first = socket.on_fn("c", "e", |_| async { Ok(()) });
        let second = socket.on_fn("c", "e", |_| async { Ok(()) });
        drop(first);
        {
            let registry = socket.lock_registry();
            let registrations = registry
                .get(&("c".to_string(), "e".to_string()))
                .unwrap();
            assert_eq!(registrations.len(), 1);
        }
        drop(second);
        assert!(socket.lock_registry().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_reaches_exact_and_wildcard_handlers() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        let hits = Arc::new(AtomicU64::new(0));

        let exact_hits = hits.clone();
        let _exact = socket.on_fn("c", "identifier.created", move |_| {
            let hits = exact_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let wildcard_hits = hits.clone();
        let _wildcard = socket.on_fn("c", "*", move |_| {
            let hits = wildcard_hits.clone();
            async move {
                hits.fetch_add(10, Ordering::SeqCst);
                Ok(())
            }
        });
        let other_hits = hits.clone();
        let _other = socket.on_fn("other", "*", move |_| {
            let hits = other_hits.clone();
            async move {
                hits.fetch_add(100, Ordering::SeqCst);
                Ok(())
            }
        });

        socket
            .dispatch(EventEnvelope {
                channel: "c".to_string(),
                event: "identifier.created".to_string(),
                data: serde_json::Value::Null,
            })
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_dispatch() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        let hits = Arc::new(AtomicU64::new(0));

        let _failing = socket.on_fn("c", "e", |_| async {
            Err(Error::other("handler exploded"))
        });
        let ok_hits = hits.clone();
        let _ok = socket.on_fn("c", "e", move |_| {
            let hits = ok_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        socket
            .dispatch(EventEnvelope {
                channel: "c".to_string(),
                event: "e".to_string(),
                data: serde_json::Value::Null,
            })
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inbound_cursor_updates_subscription() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        socket
            .lock_subscriptions()
            .insert("c".to_string(), Cursor::Start);

        socket
            .handle_text(
                r#"{"type":"event","channel":"c","event":"identifier.created","data":{"identifier_id":"i1","type":"email","display_value":"a@b.c","cursor":"1700000000000-3"}}"#,
            )
            .await;

        let subscriptions = socket.lock_subscriptions();
        assert_eq!(
            subscriptions.get("c"),
            Some(&Cursor::At("1700000000000-3".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connected_frame_is_not_dispatched() {
        let socket = client().socket(SocketOptions::default()).unwrap();
        let hits = Arc::new(AtomicU64::new(0));
        let handler_hits = hits.clone();
        let _guard = socket.on_fn("c", "*", move |_| {
            let hits = handler_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        socket
            .handle_text(r#"{"type":"connected","data":{"connectionId":"conn-1"}}"#)
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_options() {
        let options = SocketOptions::default();
        assert_eq!(options.ping_interval, Duration::from_secs(30));
        assert_eq!(options.pong_timeout, Duration::from_secs(10));
        assert_eq!(options.restart_close_code, RESTART_CLOSE_CODE);
    }
}
