//! Observable sync state.

use std::fmt;

/// Where the orchestrator is in its cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Offline,
    /// Waiting to retry after `n` consecutive server or network failures
    Backoff(u32),
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Syncing => f.write_str("syncing"),
            Self::Offline => f.write_str("offline"),
            Self::Backoff(retry) => write!(f, "backoff (retry {retry})"),
        }
    }
}

/// Snapshot published to the UI on every transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// Wall-clock time of the last successful cycle (Unix ms)
    pub last_synced_at: Option<i64>,
    /// Message of the last failed cycle, cleared on success
    pub last_error: Option<String>,
    pub offline: bool,
    /// Consecutive server or network failures
    pub retry_count: u32,
    /// Periodic sync paused after too many failures
    pub suspended: bool,
}

impl SyncStatus {
    /// One-line summary for status bars and logs.
    pub fn summary(&self) -> String {
        let mut summary = format!("Sync: {}", self.phase);
        if self.suspended {
            summary.push_str(", paused after repeated failures");
        }
        if let Some(error) = &self.last_error {
            summary.push_str(" - ");
            summary.push_str(error);
        }
        summary
    }
}
