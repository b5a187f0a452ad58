//! HTTP implementation of the remote notes client.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::{Endpoint, RemoteClient, RemoteError};
use crate::connectivity::ConnectivityMonitor;
use crate::models::{Collection, Note};
use crate::util::compact_text;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_MS: u64 = 1_000;

/// Tuning for [`HttpNotesClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientOptions {
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts after the first one for retryable failures
    pub retries: u32,
    /// Sleep before retry `n` is `retry_base * 2^n`
    pub retry_base: Duration,
    /// Retry over plain HTTP once if the TLS handshake fails
    pub http_fallback: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retries: DEFAULT_REQUEST_RETRIES,
            retry_base: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            http_fallback: false,
        }
    }
}

/// `GET`s and `POST`s JSON note arrays against the notes endpoint.
#[derive(Clone)]
pub struct HttpNotesClient {
    client: reqwest::Client,
    options: HttpClientOptions,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
}

impl HttpNotesClient {
    pub fn new(options: HttpClientOptions) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|error| {
                RemoteError::Transport(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            client,
            options,
            connectivity: None,
        })
    }

    /// Refuse to touch the network while `monitor` reports no connectivity.
    #[must_use]
    pub fn with_connectivity(mut self, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    async fn ensure_online(&self, operation: &str) -> Result<(), RemoteError> {
        let Some(monitor) = &self.connectivity else {
            return Ok(());
        };
        if monitor.is_connected().await {
            Ok(())
        } else {
            tracing::warn!("Cannot {operation} notes: device is offline");
            Err(RemoteError::Offline)
        }
    }

    async fn with_retry<F, Fut, T>(
        &self,
        operation: &str,
        endpoint: &Endpoint,
        request: F,
    ) -> Result<T, RemoteError>
    where
        F: Fn(Endpoint) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RemoteError>> + Send,
        T: Send,
    {
        let mut target = endpoint.clone();
        let mut fallback_used = false;
        let mut attempt = 0;

        loop {
            match request(target.clone()).await {
                Ok(value) => {
                    if attempt > 0 || fallback_used {
                        tracing::info!(
                            operation,
                            attempt,
                            fallback_used,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => {
                    tracing::error!(operation, %error, "Request failed, not retrying");
                    return Err(error);
                }
                Err(error) => {
                    // The plain-HTTP attempt does not count against `retries`.
                    if self.options.http_fallback && !fallback_used && error.looks_like_tls_failure()
                    {
                        if let Some(insecure) = endpoint.without_tls() {
                            tracing::warn!(operation, %error, "TLS failure, retrying over plain HTTP");
                            target = insecure;
                            fallback_used = true;
                            continue;
                        }
                    }

                    if attempt >= self.options.retries {
                        tracing::error!(operation, %error, "All attempts failed");
                        return Err(error);
                    }

                    let delay = self.options.retry_base * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn fetch_once(&self, endpoint: Endpoint) -> Result<Collection, RemoteError> {
        let response = self
            .client
            .get(endpoint.url().clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| self.classify(&error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.classify(&error))?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_notes_payload(&body)
    }

    async fn push_once(&self, endpoint: Endpoint, notes: &Collection) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(endpoint.url().clone())
            .json(notes)
            .send()
            .await
            .map_err(|error| self.classify(&error))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    fn classify(&self, error: &reqwest::Error) -> RemoteError {
        if error.is_timeout() {
            return RemoteError::Timeout(self.options.timeout);
        }
        if let Some(status) = error.status() {
            return RemoteError::from_status(status.as_u16(), error.to_string());
        }
        if error.is_decode() {
            return RemoteError::Malformed(error_chain(error));
        }
        RemoteError::Transport(error_chain(error))
    }
}

#[async_trait]
impl RemoteClient for HttpNotesClient {
    async fn fetch_all(&self, endpoint: &Endpoint) -> Result<Collection, RemoteError> {
        self.ensure_online("fetch").await?;
        let notes = self
            .with_retry("fetch", endpoint, |target| self.fetch_once(target))
            .await?;
        tracing::debug!(notes = notes.len(), %endpoint, "Fetched notes");
        Ok(notes)
    }

    async fn push_subset(
        &self,
        endpoint: &Endpoint,
        notes: &Collection,
    ) -> Result<(), RemoteError> {
        if notes.is_empty() {
            return Ok(());
        }
        self.ensure_online("push").await?;
        self.with_retry("push", endpoint, |target| self.push_once(target, notes))
            .await?;
        tracing::debug!(notes = notes.len(), %endpoint, "Pushed notes");
        Ok(())
    }
}

/// Parse a server response into a collection.
///
/// The payload must be a JSON array. Entries that are not notes, or whose id
/// is missing or blank, are skipped.
pub fn parse_notes_payload(payload: &str) -> Result<Collection, RemoteError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|error| RemoteError::Malformed(format!("invalid JSON: {error}")))?;
    let Value::Array(entries) = value else {
        return Err(RemoteError::Malformed(
            "expected a JSON array of notes".to_string(),
        ));
    };

    let total = entries.len();
    let notes: Vec<Note> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Note>(entry) {
            Ok(note) => Some(note),
            Err(error) => {
                tracing::debug!(%error, "Skipping malformed note in server payload");
                None
            }
        })
        .collect();
    let collection = Collection::from_notes(notes);
    if collection.len() < total {
        tracing::debug!(
            kept = collection.len(),
            total,
            "Dropped unusable or duplicate notes from server payload"
        );
    }
    Ok(collection)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn status_error(status: StatusCode, body: &str) -> RemoteError {
    RemoteError::from_status(status.as_u16(), api_error_message(status, body))
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
