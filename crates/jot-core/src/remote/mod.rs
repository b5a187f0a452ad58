//! Remote notes server contract.

mod http;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::error::Error;
use crate::models::Collection;
use crate::util::{is_http_url, normalize_text_option};

pub use http::{parse_notes_payload, HttpClientOptions, HttpNotesClient};

/// Endpoint used when no server URL is configured.
pub const DEFAULT_NOTES_ENDPOINT: &str = "http://127.0.0.1:8080/notes";

const NOTES_SEGMENT: &str = "notes";
const NOTES_PATH_SUFFIX: &str = "/notes";

/// Fully resolved URL of the notes collection on a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Resolve a configured server URL into the notes collection URL.
    ///
    /// The URL must use http or https. If it does not already address the
    /// notes collection, `/notes` is appended.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::Config("server URL must not be empty".to_string()));
        }
        if !is_http_url(trimmed) {
            return Err(Error::Config(
                "server URL must include http:// or https://".to_string(),
            ));
        }

        let mut url = Url::parse(trimmed)
            .map_err(|error| Error::Config(format!("invalid server URL '{trimmed}': {error}")))?;
        if !url.path().trim_end_matches('/').ends_with(NOTES_PATH_SUFFIX) {
            url.path_segments_mut()
                .map_err(|()| Error::Config(format!("server URL '{trimmed}' cannot take a path")))?
                .pop_if_empty()
                .push(NOTES_SEGMENT);
        }
        Ok(Self(url))
    }

    /// Like [`Endpoint::parse`], falling back to [`DEFAULT_NOTES_ENDPOINT`]
    /// when nothing is configured.
    pub fn resolve(configured: Option<&str>) -> Result<Self, Error> {
        match normalize_text_option(configured.map(str::to_string)) {
            Some(raw) => Self::parse(&raw),
            None => Self::parse(DEFAULT_NOTES_ENDPOINT),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub const fn url(&self) -> &Url {
        &self.0
    }

    pub fn host(&self) -> Option<String> {
        self.0.host_str().map(str::to_string)
    }

    pub fn port(&self) -> Option<u16> {
        self.0.port_or_known_default()
    }

    /// Same endpoint over plain HTTP, for servers with broken TLS setups.
    pub fn without_tls(&self) -> Option<Self> {
        if self.0.scheme() != "https" {
            return None;
        }
        let mut url = self.0.clone();
        url.set_scheme("http").ok()?;
        Some(Self(url))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Failures reported by a [`RemoteClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Device is offline")]
    Offline,
    #[error("Request rejected ({status}): {message}")]
    Client { status: u16, message: String },
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Malformed notes payload: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Build the error for a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            Self::Client { status, message }
        } else {
            Self::Server { status, message }
        }
    }

    /// Server errors, timeouts and transport failures may succeed on retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::Timeout(_) | Self::Transport(_)
        )
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn looks_like_tls_failure(&self) -> bool {
        let Self::Transport(message) = self else {
            return false;
        };
        let message = message.to_ascii_lowercase();
        message.contains("tls") || message.contains("ssl") || message.contains("certificate")
    }
}

/// Access to the server-side copy of the note collection.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch every note the server holds.
    async fn fetch_all(&self, endpoint: &Endpoint) -> Result<Collection, RemoteError>;

    /// Upload notes the server is missing or holds an older copy of.
    /// Implementations must not touch the network for an empty subset.
    async fn push_subset(&self, endpoint: &Endpoint, notes: &Collection)
        -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_notes_path() {
        assert_eq!(
            Endpoint::parse("https://notes.example.com").unwrap().as_str(),
            "https://notes.example.com/notes"
        );
        assert_eq!(
            Endpoint::parse(" https://notes.example.com/api/ ").unwrap().as_str(),
            "https://notes.example.com/api/notes"
        );
    }

    #[test]
    fn endpoint_keeps_existing_notes_path() {
        assert_eq!(
            Endpoint::parse("https://notes.example.com/notes/").unwrap().as_str(),
            "https://notes.example.com/notes"
        );
    }

    #[test]
    fn endpoint_appends_path_before_query() {
        assert_eq!(
            Endpoint::parse("http://h.example.com/api?k=1").unwrap().as_str(),
            "http://h.example.com/api/notes?k=1"
        );
        assert_eq!(
            Endpoint::parse("http://h.example.com/?k=1").unwrap().as_str(),
            "http://h.example.com/notes?k=1"
        );
        assert_eq!(
            Endpoint::parse("http://h.example.com/mynotes").unwrap().as_str(),
            "http://h.example.com/mynotes/notes"
        );
    }

    #[test]
    fn endpoint_rejects_invalid_values() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse("notes.example.com").is_err());
        assert!(Endpoint::parse("ftp://notes.example.com").is_err());
    }

    #[test]
    fn endpoint_resolve_falls_back_to_default() {
        assert_eq!(
            Endpoint::resolve(None).unwrap().as_str(),
            DEFAULT_NOTES_ENDPOINT
        );
        assert_eq!(
            Endpoint::resolve(Some("   ")).unwrap().as_str(),
            DEFAULT_NOTES_ENDPOINT
        );
        assert_eq!(
            Endpoint::resolve(Some("http://10.0.2.2:3000")).unwrap().as_str(),
            "http://10.0.2.2:3000/notes"
        );
    }

    #[test]
    fn endpoint_exposes_probe_target() {
        let endpoint = Endpoint::parse("https://notes.example.com").unwrap();
        assert_eq!(endpoint.host().as_deref(), Some("notes.example.com"));
        assert_eq!(endpoint.port(), Some(443));
        assert_eq!(
            endpoint.without_tls().unwrap().as_str(),
            "http://notes.example.com/notes"
        );
        assert!(Endpoint::parse("http://localhost:9000")
            .unwrap()
            .without_tls()
            .is_none());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            RemoteError::from_status(404, "missing"),
            RemoteError::Client { status: 404, .. }
        ));
        assert!(matches!(
            RemoteError::from_status(503, "busy"),
            RemoteError::Server { status: 503, .. }
        ));
        assert!(!RemoteError::from_status(422, "bad").is_retryable());
        assert!(RemoteError::from_status(500, "boom").is_retryable());
        assert!(RemoteError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!RemoteError::Offline.is_retryable());
        assert!(!RemoteError::Malformed("x".into()).is_retryable());
    }

    #[test]
    fn tls_failures_are_recognised() {
        assert!(RemoteError::Transport("invalid peer certificate".into()).looks_like_tls_failure());
        assert!(!RemoteError::Transport("connection refused".into()).looks_like_tls_failure());
        assert!(!RemoteError::Offline.looks_like_tls_failure());
    }
}
