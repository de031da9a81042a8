//! Typed resource client for the Scambus REST surface.
//!
//! [`ScambusClient`] is a thin typed wrapper over [`crate::transport`]: it
//! builds request bodies from typed inputs, issues the call, and parses the
//! JSON result into the records in [`crate::types`]. It is stateless between
//! calls; all validation, deduplication, confidence scoring, and report
//! rendering happen on the server.
//!
//! Every list/query endpoint returns a [`Page`] regardless of how the
//! server paginates, so callers loop one way:
//!
//! ```rust,no_run
//! # use scambus::{ScambusClient, ClientOptions};
//! # async fn example() -> scambus::Result<()> {
//! # let client = ScambusClient::new(ClientOptions::builder()
//! #     .base_url("https://api.scambus.net").bearer_token("t").build()?)?;
//! let mut cursor = None;
//! loop {
//!     let page = client.list_cases(cursor.as_deref(), 50).await?;
//!     for case in &page.data {
//!         println!("{} {}", case.id, case.name);
//!     }
//!     if !page.has_more {
//!         break;
//!     }
//!     cursor = page.next_cursor;
//! }
//! # Ok(())
//! # }
//! ```

use crate::transport::{RequestOptions, Transport};
use crate::types::{
    BackfillStatus, Case, ClientOptions, Identifier, JournalEntry, MediaUpload, Page,
    Report, StreamInfo, Tag,
};
use crate::{Error, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Typed client for the Scambus API.
///
/// Cloning is cheap and clones share one connection pool.
#[derive(Clone)]
pub struct ScambusClient {
    transport: Transport,
}

impl ScambusClient {
    /// Create a client from options. Fails at construction when
    /// configuration (credentials, base URL) is unusable.
    pub fn new(options: ClientOptions) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(options)?,
        })
    }

    /// The underlying transport, for stream consumers and advanced callers.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn parse<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
        serde_json::from_value(value).map_err(Error::Json)
    }

    fn page_query(cursor: Option<&str>, limit: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        query
    }

    // ------------------------------------------------------------------
    // Cases
    // ------------------------------------------------------------------

    pub async fn create_case(&self, name: &str, description: Option<&str>) -> Result<Case> {
        let body = json!({ "name": name, "description": description });
        Self::parse(self.transport.post("/cases", &body).await?)
    }

    pub async fn get_case(&self, id: &str) -> Result<Case> {
        Self::parse(self.transport.get(&format!("/cases/{}", id), &[]).await?)
    }

    pub async fn list_cases(&self, cursor: Option<&str>, limit: u32) -> Result<Page<Case>> {
        let query = Self::page_query(cursor, limit);
        Self::parse(self.transport.get("/cases", &query).await?)
    }

    pub async fn update_case(&self, id: &str, patch: serde_json::Value) -> Result<Case> {
        Self::parse(
            self.transport
                .put(&format!("/cases/{}", id), &patch)
                .await?,
        )
    }

    pub async fn close_case(&self, id: &str) -> Result<Case> {
        let body = json!({ "status": "closed" });
        Self::parse(
            self.transport
                .put(&format!("/cases/{}", id), &body)
                .await?,
        )
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    pub async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag> {
        let body = json!({ "name": name, "color": color });
        Self::parse(self.transport.post("/tags", &body).await?)
    }

    pub async fn list_tags(&self, cursor: Option<&str>, limit: u32) -> Result<Page<Tag>> {
        let query = Self::page_query(cursor, limit);
        Self::parse(self.transport.get("/tags", &query).await?)
    }

    pub async fn delete_tag(&self, id: &str) -> Result<()> {
        self.transport.delete(&format!("/tags/{}", id)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Journal entries
    // ------------------------------------------------------------------

    /// Submit a scam report. Returns a handle carrying the lazily attached
    /// "complete" capability for in-progress entries.
    pub async fn submit_entry(&self, entry: NewJournalEntry) -> Result<JournalEntryHandle> {
        let body = entry.into_body();
        let record: JournalEntry = Self::parse(self.transport.post("/entries", &body).await?)?;
        Ok(JournalEntryHandle {
            client: self.clone(),
            entry: record,
        })
    }

    pub async fn get_entry(&self, id: &str) -> Result<JournalEntry> {
        Self::parse(self.transport.get(&format!("/entries/{}", id), &[]).await?)
    }

    pub async fn query_entries(
        &self,
        filter: Option<&str>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<JournalEntry>> {
        let mut query = Self::page_query(cursor, limit);
        if let Some(filter) = filter {
            query.push(("q", filter.to_string()));
        }
        Self::parse(self.transport.get("/entries", &query).await?)
    }

    /// Mark an in-progress entry as complete. Owned by
    /// [`JournalEntryHandle::complete`]; exposed for callers that only hold
    /// an id.
    pub async fn complete_entry(&self, id: &str) -> Result<JournalEntry> {
        let body = json!({});
        Self::parse(
            self.transport
                .post(&format!("/entries/{}/complete", id), &body)
                .await?,
        )
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    pub async fn get_identifier(&self, id: &str) -> Result<Identifier> {
        Self::parse(
            self.transport
                .get(&format!("/identifiers/{}", id), &[])
                .await?,
        )
    }

    pub async fn query_identifiers(
        &self,
        filter: Option<&str>,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<Identifier>> {
        let mut query = Self::page_query(cursor, limit);
        if let Some(filter) = filter {
            query.push(("q", filter.to_string()));
        }
        Self::parse(self.transport.get("/identifiers", &query).await?)
    }

    // ------------------------------------------------------------------
    // Media
    // ------------------------------------------------------------------

    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime: &str,
    ) -> Result<MediaUpload> {
        Self::parse(
            self.transport
                .upload("/media", "file", filename, bytes, mime)
                .await?,
        )
    }

    // ------------------------------------------------------------------
    // Reports (opaque: rendering is server-owned)
    // ------------------------------------------------------------------

    pub async fn request_report(&self, case_id: &str) -> Result<Report> {
        let body = json!({ "case_id": case_id });
        Self::parse(self.transport.post("/reports", &body).await?)
    }

    pub async fn get_report(&self, id: &str) -> Result<Report> {
        Self::parse(self.transport.get(&format!("/reports/{}", id), &[]).await?)
    }

    // ------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------

    /// Create an export stream. `data_type` is `journal_entry` or
    /// `identifier`; filtering semantics are applied server-side at
    /// creation time.
    pub async fn create_stream(
        &self,
        data_type: &str,
        name: Option<&str>,
        filter: Option<serde_json::Value>,
    ) -> Result<StreamInfo> {
        let body = json!({
            "data_type": data_type,
            "name": name,
            "filter": filter,
        });
        Self::parse(self.transport.post("/streams", &body).await?)
    }

    pub async fn get_stream(&self, consumer_key: &str) -> Result<StreamInfo> {
        Self::parse(
            self.transport
                .get(&format!("/streams/{}", consumer_key), &[])
                .await?,
        )
    }

    pub async fn list_streams(&self, cursor: Option<&str>, limit: u32) -> Result<Page<StreamInfo>> {
        let query = Self::page_query(cursor, limit);
        Self::parse(self.transport.get("/streams", &query).await?)
    }

    pub async fn delete_stream(&self, consumer_key: &str) -> Result<()> {
        self.transport
            .delete(&format!("/streams/{}", consumer_key))
            .await?;
        Ok(())
    }

    /// Trigger a historical backfill into an identifier stream. The backfill
    /// itself is opaque to this client; poll [`Self::backfill_status`] for
    /// completion.
    pub async fn trigger_backfill(&self, consumer_key: &str) -> Result<BackfillStatus> {
        let body = json!({});
        let opts = RequestOptions {
            idempotent: true,
            ..Default::default()
        };
        Self::parse(
            self.transport
                .request(
                    Method::POST,
                    &format!("/streams/{}/backfill", consumer_key),
                    &[],
                    Some(&body),
                    &opts,
                )
                .await?,
        )
    }

    pub async fn backfill_status(&self, consumer_key: &str) -> Result<BackfillStatus> {
        Self::parse(
            self.transport
                .get(&format!("/streams/{}/backfill", consumer_key), &[])
                .await?,
        )
    }
}

/// A submitted journal entry plus its "complete" capability.
///
/// Entries submitted with `in_progress` stay open until completed; the
/// handle keeps the client around so completion is one call.
pub struct JournalEntryHandle {
    client: ScambusClient,
    entry: JournalEntry,
}

impl JournalEntryHandle {
    /// The submitted entry record.
    pub fn entry(&self) -> &JournalEntry {
        &self.entry
    }

    /// Consume the handle and return the record.
    pub fn into_entry(self) -> JournalEntry {
        self.entry
    }

    /// Mark the entry complete. Whether an entry without an end time gets
    /// one defaulted is server-side validation; this call just flips the
    /// state.
    pub async fn complete(self) -> Result<JournalEntry> {
        self.client.complete_entry(&self.entry.id).await
    }
}

/// Builder for a new journal entry submission.
///
/// The builder is pass-through: it serializes exactly the fields you set
/// and leaves defaulting (e.g. instant completion when neither end time nor
/// `in_progress` is given) to the server's validation.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    entry_type: String,
    description: String,
    performed_at: Option<String>,
    ended_at: Option<String>,
    in_progress: Option<bool>,
    identifiers: Vec<serde_json::Value>,
    evidence: Vec<serde_json::Value>,
    details: Option<serde_json::Value>,
}

impl NewJournalEntry {
    pub fn new(entry_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            description: description.into(),
            performed_at: None,
            ended_at: None,
            in_progress: None,
            identifiers: Vec::new(),
            evidence: Vec::new(),
            details: None,
        }
    }

    pub fn performed_at(mut self, ts: impl Into<String>) -> Self {
        self.performed_at = Some(ts.into());
        self
    }

    pub fn ended_at(mut self, ts: impl Into<String>) -> Self {
        self.ended_at = Some(ts.into());
        self
    }

    pub fn in_progress(mut self, in_progress: bool) -> Self {
        self.in_progress = Some(in_progress);
        self
    }

    /// Attach an identifier lookup (`type` + raw value); the server resolves
    /// it to an identifier record or creates one.
    pub fn identifier(mut self, id_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.push(json!({
            "type": id_type.into(),
            "value": value.into(),
        }));
        self
    }

    /// Attach uploaded media evidence by its upload id.
    pub fn evidence(mut self, media_id: impl Into<String>) -> Self {
        self.evidence.push(json!({ "media_id": media_id.into() }));
        self
    }

    /// Free-form detail payload, passed through unchanged.
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn into_body(self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("type".into(), json!(self.entry_type));
        obj.insert("description".into(), json!(self.description));
        obj.insert("identifiers".into(), json!(self.identifiers));
        obj.insert("evidence".into(), json!(self.evidence));
        if let Some(ts) = self.performed_at {
            obj.insert("performed_at".into(), json!(ts));
        }
        if let Some(ts) = self.ended_at {
            obj.insert("ended_at".into(), json!(ts));
        }
        if let Some(in_progress) = self.in_progress {
            obj.insert("in_progress".into(), json!(in_progress));
        }
        if let Some(details) = self.details {
            obj.insert("details".into(), details);
        }
        serde_json::Value::Object(obj)
    }
}
