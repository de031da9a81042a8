//! Configuration resolution for the Scambus SDK
//!
//! Resolution is pure input: it runs once when a client (or the CLI) is
//! constructed and nothing mutates it afterwards. Precedence is always
//! explicit argument > environment variable > config file > built-in default.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Default API endpoint when nothing else is configured
pub const DEFAULT_API_URL: &str = "https://api.scambus.net";

/// Environment variable for the API base URL
pub const ENV_API_URL: &str = "SCAMBUS_API_URL";
/// Environment variable for the API key id
pub const ENV_KEY_ID: &str = "SCAMBUS_KEY_ID";
/// Environment variable for the API key secret
pub const ENV_KEY_SECRET: &str = "SCAMBUS_KEY_SECRET";
/// Environment variable for a bearer token
pub const ENV_TOKEN: &str = "SCAMBUS_TOKEN";

/// How requests authenticate to the API.
///
/// Exactly one scheme is active per client. `ApiKey` becomes an
/// `X-API-Key: <key_id>:<secret>` header; `Bearer` becomes
/// `Authorization: Bearer <token>`. The same credentials are applied
/// identically across REST, SSE, and WebSocket connections.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Composite key id + secret header
    ApiKey { key_id: String, secret: String },
    /// Bearer token
    Bearer(String),
}

impl Credentials {
    /// Header name/value pair for this credential scheme.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Credentials::ApiKey { key_id, secret } => {
                ("X-API-Key", format!("{}:{}", key_id, secret))
            }
            Credentials::Bearer(token) => ("Authorization", format!("Bearer {}", token)),
        }
    }
}

// Never print secrets in debug output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey { key_id, .. } => f
                .debug_struct("ApiKey")
                .field("key_id", key_id)
                .field("secret", &"***")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"***").finish(),
        }
    }
}

/// On-disk config file shape (`~/.config/scambus/config.json`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub api_url: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub token: Option<String>,
}

impl ConfigFile {
    /// Default config file path, if the home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("scambus")
                .join("config.json"),
        )
    }

    /// Load the config file, returning an empty config when it does not exist.
    ///
    /// A file that exists but fails to parse is a configuration error, not a
    /// silent fallback.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                Error::config(format!("failed to parse {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::config(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Resolve the API base URL.
///
/// Priority:
/// 1. `explicit` argument
/// 2. `SCAMBUS_API_URL` environment variable
/// 3. config file `api_url`
/// 4. [`DEFAULT_API_URL`]
pub fn resolve_api_url(explicit: Option<&str>, file: &ConfigFile) -> String {
    if let Some(url) = explicit {
        return url.trim_end_matches('/').to_string();
    }
    if let Ok(url) = env::var(ENV_API_URL) {
        return url.trim_end_matches('/').to_string();
    }
    file.api_url
        .as_deref()
        .unwrap_or(DEFAULT_API_URL)
        .trim_end_matches('/')
        .to_string()
}

/// Resolve credentials from explicit arguments, environment, then config file.
///
/// Absence of both schemes is a fatal configuration error raised here, at
/// construction, never deferred to the first request. When both schemes are
/// present at the same precedence level the key pair wins, matching the
/// server's own documentation.
pub fn resolve_credentials(
    key_id: Option<&str>,
    key_secret: Option<&str>,
    token: Option<&str>,
    file: &ConfigFile,
) -> Result<Credentials> {
    if let (Some(id), Some(secret)) = (key_id, key_secret) {
        return Ok(Credentials::ApiKey {
            key_id: id.to_string(),
            secret: secret.to_string(),
        });
    }
    if let Some(token) = token {
        return Ok(Credentials::Bearer(token.to_string()));
    }

    let env_id = env::var(ENV_KEY_ID).ok();
    let env_secret = env::var(ENV_KEY_SECRET).ok();
    if let (Some(id), Some(secret)) = (env_id, env_secret) {
        return Ok(Credentials::ApiKey {
            key_id: id,
            secret,
        });
    }
    if let Ok(token) = env::var(ENV_TOKEN) {
        return Ok(Credentials::Bearer(token));
    }

    if let (Some(id), Some(secret)) = (file.key_id.as_deref(), file.key_secret.as_deref()) {
        return Ok(Credentials::ApiKey {
            key_id: id.to_string(),
            secret: secret.to_string(),
        });
    }
    if let Some(token) = file.token.as_deref() {
        return Ok(Credentials::Bearer(token.to_string()));
    }

    Err(Error::config(
        "no credentials configured: set --key-id/--key-secret or --token \
         (or SCAMBUS_KEY_ID/SCAMBUS_KEY_SECRET, SCAMBUS_TOKEN)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_header() {
        let creds = Credentials::ApiKey {
            key_id: "k1".to_string(),
            secret: "s3cret".to_string(),
        };
        assert_eq!(creds.header(), ("X-API-Key", "k1:s3cret".to_string()));
    }

    #[test]
    fn test_bearer_header() {
        let creds = Credentials::Bearer("tok".to_string());
        assert_eq!(creds.header(), ("Authorization", "Bearer tok".to_string()));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::ApiKey {
            key_id: "k1".to_string(),
            secret: "supersecret".to_string(),
        };
        let dbg = format!("{:?}", creds);
        assert!(dbg.contains("k1"));
        assert!(!dbg.contains("supersecret"));

        let bearer = format!("{:?}", Credentials::Bearer("tok123".to_string()));
        assert!(!bearer.contains("tok123"));
    }

    #[test]
    fn test_resolve_api_url_explicit_wins() {
        let file = ConfigFile {
            api_url: Some("https://file.example".to_string()),
            ..Default::default()
        };
        let url = resolve_api_url(Some("https://cli.example/"), &file);
        assert_eq!(url, "https://cli.example");
    }

    #[test]
    fn test_resolve_api_url_default() {
        env::remove_var(ENV_API_URL);
        let url = resolve_api_url(None, &ConfigFile::default());
        assert_eq!(url, DEFAULT_API_URL);
    }

    #[test]
    fn test_resolve_credentials_explicit() {
        let creds =
            resolve_credentials(Some("id"), Some("sec"), None, &ConfigFile::default()).unwrap();
        assert!(matches!(creds, Credentials::ApiKey { .. }));

        let creds =
            resolve_credentials(None, None, Some("tok"), &ConfigFile::default()).unwrap();
        assert_eq!(creds, Credentials::Bearer("tok".to_string()));
    }

    #[test]
    fn test_resolve_credentials_from_file() {
        env::remove_var(ENV_KEY_ID);
        env::remove_var(ENV_KEY_SECRET);
        env::remove_var(ENV_TOKEN);
        let file = ConfigFile {
            token: Some("file-token".to_string()),
            ..Default::default()
        };
        let creds = resolve_credentials(None, None, None, &file).unwrap();
        assert_eq!(creds, Credentials::Bearer("file-token".to_string()));
    }

    #[test]
    fn test_resolve_credentials_missing_is_config_error() {
        env::remove_var(ENV_KEY_ID);
        env::remove_var(ENV_KEY_SECRET);
        env::remove_var(ENV_TOKEN);
        let err = resolve_credentials(None, None, None, &ConfigFile::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
