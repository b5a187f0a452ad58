//! Injectable sync log.
//!
//! The orchestrator reports through a [`SyncLog`] handed to it at construction
//! instead of a process-wide logger. [`TracingSyncLog`] forwards to `tracing`;
//! [`MemorySyncLog`] also keeps recent entries for an in-app diagnostics view.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.at.format("%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

pub trait SyncLog: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

/// Forwards every entry to `tracing` under the `jot::sync` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSyncLog;

impl SyncLog for TracingSyncLog {
    fn log(&self, level: LogLevel, message: &str) {
        emit(level, message);
    }
}

fn emit(level: LogLevel, message: &str) {
    match level {
        LogLevel::Error => tracing::error!(target: "jot::sync", "{message}"),
        LogLevel::Warning => tracing::warn!(target: "jot::sync", "{message}"),
        LogLevel::Info => tracing::info!(target: "jot::sync", "{message}"),
        LogLevel::Debug => tracing::debug!(target: "jot::sync", "{message}"),
    }
}

const DEFAULT_MEMORY_LOG_CAPACITY: usize = 200;

/// Bounded in-memory log. Entries above `max_level` are dropped; every kept
/// entry is also forwarded to `tracing`.
#[derive(Debug)]
pub struct MemorySyncLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    max_level: LogLevel,
}

impl Default for MemorySyncLog {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_LOG_CAPACITY, LogLevel::Info)
    }
}

impl MemorySyncLog {
    pub fn new(capacity: usize, max_level: LogLevel) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            max_level,
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn errors(&self) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.level == LogLevel::Error)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncLog for MemorySyncLog {
    fn log(&self, level: LogLevel, message: &str) {
        if level > self.max_level {
            return;
        }
        emit(level, message);

        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            at: Utc::now(),
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_filters_by_level() {
        let log = MemorySyncLog::new(10, LogLevel::Warning);
        log.info("hidden");
        log.warning("slow server");
        log.error("sync failed");

        let levels: Vec<LogLevel> = log.entries().iter().map(|entry| entry.level).collect();
        assert_eq!(levels, vec![LogLevel::Warning, LogLevel::Error]);
        assert_eq!(log.errors().len(), 1);
    }

    #[test]
    fn memory_log_drops_oldest_when_full() {
        let log = MemorySyncLog::new(2, LogLevel::Debug);
        log.debug("one");
        log.debug("two");
        log.debug("three");

        let messages: Vec<String> = log.entries().into_iter().map(|entry| entry.message).collect();
        assert_eq!(messages, vec!["two", "three"]);

        log.clear();
        assert!(log.entries().is_empty());
    }

    #[test]
    fn entry_display_includes_level() {
        let log = MemorySyncLog::default();
        log.error("boom");
        let line = log.entries()[0].to_string();
        assert!(line.ends_with("error: boom"), "{line}");
    }
}
