//! Sync tuning knobs.

use std::time::Duration;

use super::backoff::BackoffPolicy;

/// Timing and retry policy for a [`SyncEngine`](super::SyncEngine) and its
/// [`SyncDriver`](super::SyncDriver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Unforced syncs within this long of the last success are throttled
    pub min_interval: Duration,
    /// The in-flight guard stays closed this long after a cycle finishes
    pub lock_cooldown: Duration,
    /// Quiet period collapsing bursts of local edits into one sync
    pub debounce: Duration,
    /// Minimum spacing between two syncs triggered by local edits
    pub change_dwell: Duration,
    /// Periodic sync period while the app is in the foreground
    pub active_interval: Duration,
    /// Periodic sync period while the app is in the background
    pub background_interval: Duration,
    /// A periodic tick syncs an unchanged collection once this many periods
    /// have passed since the last success
    pub stale_multiplier: u32,
    /// Consecutive server/network failures before periodic sync is suspended
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(15),
            lock_cooldown: Duration::from_secs(1),
            debounce: Duration::from_secs(1),
            change_dwell: Duration::from_secs(30),
            active_interval: Duration::from_secs(10 * 60),
            background_interval: Duration::from_secs(30 * 60),
            stale_multiplier: 3,
            max_retries: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SyncSettings {
    /// Periodic sync period for the given lifecycle state.
    pub const fn periodic_interval(&self, foreground: bool) -> Duration {
        if foreground {
            self.active_interval
        } else {
            self.background_interval
        }
    }

    /// Age after which a periodic tick syncs even without local changes.
    pub fn stale_after(&self, foreground: bool) -> Duration {
        self.periodic_interval(foreground)
            .saturating_mul(self.stale_multiplier)
    }
}
