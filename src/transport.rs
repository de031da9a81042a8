//! Authenticated HTTP transport for the Scambus API.
//!
//! One [`Transport`] performs one request at a time from the caller's point
//! of view: build the request, attach the credential header, send, and map
//! the response into either parsed JSON or the error taxonomy in
//! [`crate::error`]. Idempotent methods are retried automatically on
//! transient failures (connection errors plus HTTP 429/500/502/503/504) with
//! the exponential backoff from [`crate::retry`].
//!
//! The transport holds no mutable state between calls, so a host application
//! can clone it freely across tasks; each clone shares the same underlying
//! `reqwest` connection pool.
//!
//! # Response mapping
//!
//! - status 204 -> `serde_json::Value::Null`
//! - status >= 400 -> taxonomy via the JSON `error` field, falling back to
//!   the raw response text
//! - status 2xx with an unparseable body -> [`crate::Error::Protocol`]
//!   carrying the first ~200 characters of the body, so the failure is
//!   diagnosable instead of silent

use crate::retry::retry_with_backoff_conditional;
use crate::types::ClientOptions;
use crate::{Error, Result};
use log::{debug, warn};
use reqwest::{Method, StatusCode};
use std::time::Duration;

/// How many characters of an unparseable response body to keep for diagnostics
const BODY_PREVIEW_CHARS: usize = 200;

/// Statuses the transport treats as transient for idempotent requests
fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// One request's worth of knobs that differ from the transport defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Per-call timeout override
    pub timeout: Option<Duration>,
    /// Treat a POST as idempotent and retry it on transient failures
    pub idempotent: bool,
    /// Map 410/416 to [`Error::RetentionExpired`] (stream-consumption calls)
    pub retention_sensitive: bool,
}

impl RequestOptions {
    /// Options for a stream-consumption request (poll/SSE bootstrap).
    pub fn stream_consumption() -> Self {
        Self {
            retention_sensitive: true,
            ..Default::default()
        }
    }
}

/// Authenticated HTTP transport shared by the resource client and the
/// stream consumers.
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    options: ClientOptions,
}

impl Transport {
    /// Build a transport from client options.
    ///
    /// Credential validation already happened in
    /// [`ClientOptions::builder`](crate::types::ClientOptions::builder);
    /// this only constructs the pooled HTTP client.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, options })
    }

    /// The options this transport was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The fully qualified URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url, path)
    }

    /// Issue a request and parse the JSON response.
    ///
    /// GET/PUT/DELETE retry automatically on transient failures; POST only
    /// when `opts.idempotent` is set by the caller. Non-retryable errors
    /// (4xx other than 429) surface immediately.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        opts: &RequestOptions,
    ) -> Result<serde_json::Value> {
        let retryable = matches!(method, Method::GET | Method::PUT | Method::DELETE)
            || (method == Method::POST && opts.idempotent);

        if retryable {
            retry_with_backoff_conditional(self.options.retry.clone(), || {
                self.send_once(method.clone(), path, query, body, opts)
            })
            .await
        } else {
            self.send_once(method, path, query, body, opts).await
        }
    }

    /// Convenience wrapper: GET with query parameters.
    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        self.request(Method::GET, path, query, None, &RequestOptions::default())
            .await
    }

    /// Convenience wrapper: POST with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        self.request(Method::POST, path, &[], Some(body), &RequestOptions::default())
            .await
    }

    /// Convenience wrapper: PUT with a JSON body.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        self.request(Method::PUT, path, &[], Some(body), &RequestOptions::default())
            .await
    }

    /// Convenience wrapper: DELETE.
    pub async fn delete(&self, path: &str) -> Result<serde_json::Value> {
        self.request(Method::DELETE, path, &[], None, &RequestOptions::default())
            .await
    }

    /// Upload a file as multipart form data.
    ///
    /// Uploads are not idempotent and are never retried automatically.
    pub async fn upload(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<serde_json::Value> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| Error::validation(format!("invalid MIME type {:?}: {}", mime, e)))?;
        let form = reqwest::multipart::Form::new().part(field.to_string(), part);

        let (header, value) = self.options.credentials.header();
        let response = self
            .http
            .post(self.url(path))
            .header(header, value)
            .multipart(form)
            .send()
            .await
            .map_err(Error::Http)?;

        self.map_response(response, &RequestOptions::default()).await
    }

    /// Open a raw streaming GET (used by the SSE consumer). Returns the raw
    /// response with status already verified to be 2xx.
    pub async fn get_raw_stream(
        &self,
        path: &str,
        query: &[(&str, String)],
        accept: &str,
    ) -> Result<reqwest::Response> {
        let (header, value) = self.options.credentials.header();
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .header(header, value)
            .header("Accept", accept)
            // A push connection stays open indefinitely; the pooled client's
            // request timeout must not apply here.
            .timeout(Duration::from_secs(u64::MAX / 4))
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(
                status.as_u16(),
                extract_error_message(&body),
                retry_after,
                true,
            ));
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        opts: &RequestOptions,
    ) -> Result<serde_json::Value> {
        let (header, value) = self.options.credentials.header();
        let mut builder = self
            .http
            .request(method.clone(), self.url(path))
            .header(header, value);

        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }

        debug!("{} {}", method, path);
        let response = builder.send().await.map_err(Error::Http)?;
        self.map_response(response, opts).await
    }

    async fn map_response(
        &self,
        response: reqwest::Response,
        opts: &RequestOptions,
    ) -> Result<serde_json::Value> {
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(serde_json::Value::Null);
        }

        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            if is_transient_status(status) {
                warn!("transient API failure {}: {}", status, body);
            }
            return Err(Error::from_status(
                status.as_u16(),
                extract_error_message(&body),
                retry_after,
                opts.retention_sensitive,
            ));
        }

        // 2xx: the body must be JSON. A parse failure here is a protocol
        // error with a body preview, not a silent empty result.
        let text = response.text().await.map_err(Error::Http)?;
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
            Error::protocol(format!(
                "response was not valid JSON ({}): {:?}",
                e, preview
            ))
        })
    }
}

/// Pull the server's error message out of a JSON error body, falling back to
/// the raw text when the body is not the documented `{"error": ...}` shape.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.to_string())
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_json() {
        assert_eq!(
            extract_error_message(r#"{"error": "case not found"}"#),
            "case not found"
        );
    }

    #[test]
    fn test_extract_error_message_fallback_raw() {
        assert_eq!(extract_error_message("<html>504</html>"), "<html>504</html>");
        assert_eq!(extract_error_message(r#"{"detail": "odd shape"}"#), r#"{"detail": "odd shape"}"#);
    }

    #[test]
    fn test_transient_statuses() {
        for code in [429u16, 500, 502, 503, 504] {
            assert!(is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400u16, 401, 404, 410, 416, 501] {
            assert!(!is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[test]
    fn test_url_join() {
        let options = ClientOptions::builder()
            .base_url("https://api.scambus.net")
            .bearer_token("t")
            .build()
            .unwrap();
        let transport = Transport::new(options).unwrap();
        assert_eq!(
            transport.url("/cases/c-1"),
            "https://api.scambus.net/cases/c-1"
        );
    }
}
