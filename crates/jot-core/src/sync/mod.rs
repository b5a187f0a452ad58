//! Sync orchestration: when to reconcile with the server and what to do with
//! the result.

mod backoff;
mod driver;
mod engine;
mod error;
mod log;
mod settings;
mod state;
#[cfg(test)]
mod testing;
mod timer;

pub use backoff::BackoffPolicy;
pub use driver::{AppLifecycle, SyncDriver, SyncHandle};
pub use engine::{ChangeOrigin, NotesState, SyncEngine, SyncOutcome, SyncReport};
pub use error::SyncError;
pub use log::{LogEntry, LogLevel, MemorySyncLog, SyncLog, TracingSyncLog};
pub use settings::SyncSettings;
pub use state::{SyncPhase, SyncStatus};
pub use timer::Deadline;
