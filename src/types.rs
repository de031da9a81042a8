//! Core types for the Scambus SDK

use crate::config::Credentials;
use crate::cursor::Cursor;
use crate::retry::RetryConfig;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Options for configuring a [`crate::ScambusClient`]
#[derive(Clone)]
pub struct ClientOptions {
    /// API base URL, without a trailing slash
    pub base_url: String,

    /// Active credential scheme (exactly one)
    pub credentials: Credentials,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Retry policy for idempotent requests
    pub retry: RetryConfig,

    /// Include server-side test fixtures in stream output
    pub include_test: bool,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("include_test", &self.include_test)
            .finish()
    }
}

impl ClientOptions {
    /// Create a new builder for ClientOptions
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }
}

/// Builder for ClientOptions
#[derive(Default)]
pub struct ClientOptionsBuilder {
    base_url: Option<String>,
    key_id: Option<String>,
    key_secret: Option<String>,
    token: Option<String>,
    timeout: Option<u64>,
    retry: Option<RetryConfig>,
    include_test: Option<bool>,
}

impl ClientOptionsBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Authenticate with an API key pair (`X-API-Key: key_id:secret`).
    pub fn api_key(mut self, key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self.key_secret = Some(secret.into());
        self
    }

    /// Authenticate with a bearer token (`Authorization: Bearer <token>`).
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn include_test(mut self, include: bool) -> Self {
        self.include_test = Some(include);
        self
    }

    /// Build the options, failing fast when required configuration is absent.
    ///
    /// Missing credentials are a construction-time error, never deferred to
    /// the first request.
    pub fn build(self) -> crate::Result<ClientOptions> {
        let base_url = self
            .base_url
            .ok_or_else(|| crate::Error::config("base_url is required"))?
            .trim_end_matches('/')
            .to_string();

        let credentials = match (self.key_id, self.key_secret, self.token) {
            (Some(key_id), Some(secret), None) => Credentials::ApiKey { key_id, secret },
            (None, None, Some(token)) => Credentials::Bearer(token),
            (None, None, None) => {
                return Err(crate::Error::config(
                    "credentials are required: call api_key() or bearer_token()",
                ))
            }
            _ => {
                return Err(crate::Error::config(
                    "exactly one credential scheme must be configured",
                ))
            }
        };

        Ok(ClientOptions {
            base_url,
            credentials,
            timeout: self.timeout.unwrap_or(30),
            retry: self.retry.unwrap_or_default(),
            include_test: self.include_test.unwrap_or(false),
        })
    }
}

// ============================================================================
// STREAM MESSAGES
// ============================================================================

/// A single message delivered on a stream.
///
/// The server does not tag message kinds explicitly: an identifier-state
/// record is recognized by the presence of `identifier_id` (or its camelCase
/// spelling), anything else is a journal-entry record. The custom
/// `Deserialize` impl applies exactly that discriminator so consumers get an
/// explicit variant instead of sniffing fields themselves.
///
/// Messages are immutable once delivered. The same message may be
/// redelivered after a reconnect with a stale cursor; treat redelivery as
/// routine and dedupe by [`StreamMessage::cursor`] or id when exactly-once
/// matters to you.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StreamMessage {
    /// Identifier-state record
    Identifier(IdentifierEvent),
    /// Journal-entry record
    JournalEntry(JournalEntryEvent),
}

impl StreamMessage {
    /// The stream cursor attached to this message, when the server sent one.
    pub fn cursor(&self) -> Option<&str> {
        match self {
            StreamMessage::Identifier(m) => m.cursor.as_deref(),
            StreamMessage::JournalEntry(m) => m.cursor.as_deref(),
        }
    }
}

impl<'de> Deserialize<'de> for StreamMessage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let is_identifier = value
            .as_object()
            .map(|o| o.contains_key("identifier_id") || o.contains_key("identifierId"))
            .unwrap_or(false);

        if is_identifier {
            IdentifierEvent::deserialize(value)
                .map(StreamMessage::Identifier)
                .map_err(serde::de::Error::custom)
        } else {
            JournalEntryEvent::deserialize(value)
                .map(StreamMessage::JournalEntry)
                .map_err(serde::de::Error::custom)
        }
    }
}

/// Identifier-state message payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentifierEvent {
    #[serde(alias = "identifierId")]
    pub identifier_id: String,
    #[serde(rename = "type")]
    pub identifier_type: String,
    #[serde(alias = "displayValue")]
    pub display_value: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Journal entry that caused this state change, opaque passthrough
    #[serde(
        default,
        alias = "triggeringJournalEntry",
        skip_serializing_if = "Option::is_none"
    )]
    pub triggering_journal_entry: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Journal-entry message payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntryEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "performedAt")]
    pub performed_at: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<serde_json::Value>,
    #[serde(default)]
    pub evidence: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Response from the polling endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub messages: Vec<StreamMessage>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// Consumption order for the polling endpoint.
///
/// `Asc` (oldest-first) is the only order safe to chain for gapless forward
/// iteration; `Desc` exists for peek-recent use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollOrder {
    #[default]
    Asc,
    Desc,
}

impl PollOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollOrder::Asc => "asc",
            PollOrder::Desc => "desc",
        }
    }
}

/// Parameters for one polling call
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub cursor: Cursor,
    pub order: PollOrder,
    pub limit: u32,
}

impl Default for PollRequest {
    fn default() -> Self {
        Self {
            cursor: Cursor::Start,
            order: PollOrder::Asc,
            limit: 100,
        }
    }
}

// ============================================================================
// RESOURCE RECORDS
// ============================================================================

/// One page of a list/query result. Every paginated endpoint in the API is
/// exposed through this one shape regardless of whether the server paginates
/// by cursor or by page number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// A tracked case grouping related reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A label attached to cases and identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// A server-managed export stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Public identifier handed to external consumers
    pub consumer_key: String,
    /// `journal_entry` or `identifier`
    pub data_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A submitted scam report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub performed_at: Option<String>,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default)]
    pub identifiers: Vec<serde_json::Value>,
    #[serde(default)]
    pub evidence: Vec<serde_json::Value>,
}

/// An identifier (phone number, wallet, URL, ...) with server-computed state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub id: String,
    #[serde(rename = "type")]
    pub identifier_type: String,
    pub display_value: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Uploaded media evidence handle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUpload {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// A generated PDF report (opaque payload; rendering is server-owned)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Backfill progress for an identifier stream
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_options_builder() {
        let options = ClientOptions::builder()
            .base_url("https://api.scambus.net/")
            .api_key("k1", "s1")
            .timeout(15)
            .include_test(true)
            .build()
            .unwrap();

        assert_eq!(options.base_url, "https://api.scambus.net");
        assert_eq!(options.timeout, 15);
        assert!(options.include_test);
    }

    #[test]
    fn test_client_options_builder_missing_required() {
        // Missing base_url
        let result = ClientOptions::builder().bearer_token("t").build();
        assert!(result.is_err());

        // Missing credentials entirely
        let result = ClientOptions::builder()
            .base_url("https://api.scambus.net")
            .build();
        assert!(matches!(result, Err(crate::Error::Config(_))));

        // Both schemes at once
        let result = ClientOptions::builder()
            .base_url("https://api.scambus.net")
            .api_key("k", "s")
            .bearer_token("t")
            .build();
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_stream_message_identifier_discriminator() {
        let json = r#"{
            "identifier_id": "idn-1",
            "type": "phone",
            "display_value": "+1 555 0100",
            "confidence": 0.92,
            "tags": ["romance"],
            "cursor": "1000-0"
        }"#;

        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        match msg {
            StreamMessage::Identifier(m) => {
                assert_eq!(m.identifier_id, "idn-1");
                assert_eq!(m.identifier_type, "phone");
                assert_eq!(m.display_value, "+1 555 0100");
                assert!((m.confidence - 0.92).abs() < f64::EPSILON);
                assert_eq!(m.cursor.as_deref(), Some("1000-0"));
            }
            other => panic!("expected identifier message, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_message_camel_case_discriminator() {
        let json = r#"{
            "identifierId": "idn-2",
            "type": "url",
            "displayValue": "https://scam.example"
        }"#;

        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, StreamMessage::Identifier(_)));
    }

    #[test]
    fn test_stream_message_journal_entry() {
        let json = r#"{
            "id": "je-9",
            "type": "report",
            "description": "caller claimed to be the IRS",
            "performed_at": "2026-08-01T12:00:00Z",
            "identifiers": [],
            "evidence": [],
            "cursor": "2000-0"
        }"#;

        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        match msg {
            StreamMessage::JournalEntry(m) => {
                assert_eq!(m.id, "je-9");
                assert_eq!(m.entry_type, "report");
                assert_eq!(m.cursor.as_deref(), Some("2000-0"));
            }
            other => panic!("expected journal entry, got {:?}", other),
        }
    }

    #[test]
    fn test_poll_response_deserialization() {
        let json = r#"{
            "messages": [
                {"id": "je-1", "type": "report", "cursor": "1000-0"}
            ],
            "next_cursor": "1000-0",
            "has_more": true
        }"#;

        let resp: PollResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.messages.len(), 1);
        assert_eq!(resp.next_cursor.as_deref(), Some("1000-0"));
        assert!(resp.has_more);
    }

    #[test]
    fn test_poll_order_strings() {
        assert_eq!(PollOrder::Asc.as_str(), "asc");
        assert_eq!(PollOrder::Desc.as_str(), "desc");
    }

    #[test]
    fn test_page_defaults() {
        let page: Page<Case> = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(page.data.is_empty());
        assert!(page.next_cursor.is_none());
        assert!(!page.has_more);
    }
}
