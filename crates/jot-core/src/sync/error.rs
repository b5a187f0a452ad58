use thiserror::Error;

use crate::remote::RemoteError;

/// Why a sync cycle failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Device is offline")]
    Offline,
    #[error("Server rejected sync ({status}): {message}")]
    Client { status: u16, message: String },
    #[error("{0}")]
    ServerOrNetwork(RemoteError),
    #[error("Malformed sync data: {0}")]
    MalformedData(String),
    #[error("Failed to save merged notes: {0}")]
    Storage(#[source] crate::Error),
}

impl SyncError {
    /// Failures that back off and retry on their own.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerOrNetwork(_))
    }
}

impl From<RemoteError> for SyncError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Offline => Self::Offline,
            RemoteError::Client { status, message } => Self::Client { status, message },
            RemoteError::Malformed(message) => Self::MalformedData(message),
            other => Self::ServerOrNetwork(other),
        }
    }
}
