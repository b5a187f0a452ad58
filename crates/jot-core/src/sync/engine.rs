//! Sync orchestrator.
//!
//! [`SyncEngine`] owns the in-memory note collection, runs fetch/reconcile/push
//! cycles against the server and publishes both the collection and a
//! [`SyncStatus`] through `watch` channels. It never schedules anything on its
//! own; timers live in [`SyncDriver`](super::SyncDriver).

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::Instant;

use super::error::SyncError;
use super::log::{SyncLog, TracingSyncLog};
use super::settings::SyncSettings;
use super::state::{SyncPhase, SyncStatus};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::models::{Collection, Fingerprint, Note, NoteId};
use crate::reconcile::{reconcile, Reconciliation};
use crate::remote::{Endpoint, RemoteClient};
use crate::store::NoteStore;
use crate::util::unix_millis_now;

/// Who produced the latest collection change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Initial state or a reload from the store
    #[default]
    Loaded,
    /// A user edit through the engine's mutation methods
    Local,
    /// A merge written back by a sync cycle
    Sync,
}

/// The collection as published to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesState {
    pub notes: Collection,
    /// Bumped on every change
    pub version: u64,
    pub origin: ChangeOrigin,
}

/// Counts from a completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub pushed: usize,
    pub merged: usize,
    /// Local edits landed while the cycle was in flight and were merged on top
    pub rebased: bool,
}

/// Result of a [`SyncEngine::sync_notes`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Unforced sync too soon after the last success
    Throttled { retry_after: Duration },
    /// Another cycle is running or has just finished
    Coalesced { retry_after: Duration },
    /// Unforced sync with nothing changed since the last success
    Unchanged,
    /// No server configured
    Disabled,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(report) => write!(
                f,
                "synced {} notes (fetched {}, pushed {})",
                report.merged, report.fetched, report.pushed
            ),
            Self::Throttled { retry_after } => {
                write!(f, "throttled, retry in {}ms", retry_after.as_millis())
            }
            Self::Coalesced { retry_after } => write!(
                f,
                "another sync is in flight, retry in {}ms",
                retry_after.as_millis()
            ),
            Self::Unchanged => f.write_str("nothing changed since the last sync"),
            Self::Disabled => f.write_str("sync disabled, no server configured"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Guard {
    Open,
    Running,
    CoolingDown(Instant),
}

#[derive(Debug)]
struct CycleState {
    guard: Guard,
    last_success: Option<Instant>,
    last_fingerprint: Option<Fingerprint>,
}

/// Held for the duration of one cycle; closes the guard for `lock_cooldown`
/// when dropped.
struct InFlight<'a> {
    engine: &'a SyncEngine,
    cool_down: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let guard = if self.cool_down {
            Guard::CoolingDown(Instant::now() + self.engine.settings.lock_cooldown)
        } else {
            Guard::Open
        };
        self.engine.cycle().guard = guard;
    }
}

pub struct SyncEngine {
    endpoint: Option<Endpoint>,
    remote: Arc<dyn RemoteClient>,
    store: Arc<dyn NoteStore>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    log: Arc<dyn SyncLog>,
    settings: SyncSettings,
    notes: watch::Sender<NotesState>,
    status: watch::Sender<SyncStatus>,
    cycle: Mutex<CycleState>,
    /// Serializes store writes from local edits and sync merges
    writes: AsyncMutex<()>,
}

impl SyncEngine {
    /// `endpoint: None` turns every sync into a no-op.
    pub fn new(
        endpoint: Option<Endpoint>,
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn NoteStore>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        let (notes, _) = watch::channel(NotesState::default());
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            endpoint,
            remote,
            store,
            connectivity,
            log: Arc::new(TracingSyncLog),
            settings: SyncSettings::default(),
            notes,
            status,
            cycle: Mutex::new(CycleState {
                guard: Guard::Open,
                last_success: None,
                last_fingerprint: None,
            }),
            writes: AsyncMutex::new(()),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn SyncLog>) -> Self {
        self.log = log;
        self
    }

    /// Seed the in-memory collection without touching the store.
    #[must_use]
    pub fn with_notes(self, notes: Collection) -> Self {
        self.publish(notes, ChangeOrigin::Loaded);
        self
    }

    /// Reload the collection from the store. Returns the number of notes.
    pub async fn restore(&self) -> Result<usize> {
        let _write = self.writes.lock().await;
        let notes = self.store.load().await?;
        let count = notes.len();
        self.publish(notes, ChangeOrigin::Loaded);
        self.log.debug(&format!("Restored {count} notes from the store"));
        Ok(count)
    }

    pub const fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn connectivity(&self) -> &Arc<dyn ConnectivityMonitor> {
        &self.connectivity
    }

    /// Current collection.
    pub fn notes(&self) -> Collection {
        self.notes.borrow().notes.clone()
    }

    pub fn subscribe_notes(&self) -> watch::Receiver<NotesState> {
        self.notes.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Whether the collection differs from what the last successful cycle saw.
    pub fn has_unsynced_changes(&self) -> bool {
        let fingerprint = self.notes.borrow().notes.fingerprint();
        self.cycle().last_fingerprint.as_ref() != Some(&fingerprint)
    }

    /// Whether at least `age` has passed since the last success, or there has
    /// never been one.
    pub fn is_stale(&self, age: Duration) -> bool {
        self.cycle()
            .last_success
            .is_none_or(|at| at.elapsed() >= age)
    }

    /// Run one fetch/reconcile/push cycle.
    ///
    /// `force` bypasses the throttle and the unchanged check, never the
    /// in-flight guard. `override_notes` is reconciled instead of the current
    /// collection when the caller holds a more recent copy.
    pub async fn sync_notes(
        &self,
        force: bool,
        override_notes: Option<Collection>,
    ) -> std::result::Result<SyncOutcome, SyncError> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            self.log.debug("Sync skipped: no server configured");
            return Ok(SyncOutcome::Disabled);
        };

        let mut in_flight = match self.begin(force) {
            Ok(in_flight) => in_flight,
            Err(outcome) => {
                self.log.debug(&format!("Sync skipped: {outcome}"));
                return Ok(outcome);
            }
        };

        let (base_version, local) = {
            let state = self.notes.borrow();
            let local = override_notes.unwrap_or_else(|| state.notes.clone());
            (state.version, local)
        };

        if !force {
            let fingerprint = local.fingerprint();
            if self.cycle().last_fingerprint.as_ref() == Some(&fingerprint) {
                in_flight.cool_down = false;
                self.log.debug("Sync skipped: nothing changed since the last sync");
                return Ok(SyncOutcome::Unchanged);
            }
        }

        if !self.connectivity.is_connected().await {
            // Nothing was attempted, so a reconnect may retry right away.
            in_flight.cool_down = false;
            let error = SyncError::Offline;
            self.record_failure(&error);
            return Err(error);
        }

        self.update_status(|status| status.phase = SyncPhase::Syncing);
        self.log
            .info(&format!("Syncing {} notes with {endpoint}", local.len()));

        match self.run_cycle(endpoint, &local, base_version).await {
            Ok((report, fingerprint)) => {
                self.record_success(fingerprint);
                self.log.info(&format!(
                    "Sync finished: fetched {}, pushed {}, {} notes",
                    report.fetched, report.pushed, report.merged
                ));
                Ok(SyncOutcome::Completed(report))
            }
            Err(error) => {
                if matches!(error, SyncError::Offline) {
                    in_flight.cool_down = false;
                }
                self.record_failure(&error);
                Err(error)
            }
        }
    }

    fn begin(&self, force: bool) -> std::result::Result<InFlight<'_>, SyncOutcome> {
        let now = Instant::now();
        let mut cycle = self.cycle();

        if !force {
            if let Some(next) = cycle
                .last_success
                .map(|at| at + self.settings.min_interval)
                .filter(|next| *next > now)
            {
                return Err(SyncOutcome::Throttled {
                    retry_after: next - now,
                });
            }
        }

        match cycle.guard {
            Guard::Running => {
                return Err(SyncOutcome::Coalesced {
                    retry_after: self.settings.lock_cooldown,
                })
            }
            Guard::CoolingDown(until) if until > now => {
                return Err(SyncOutcome::Coalesced {
                    retry_after: until - now,
                })
            }
            Guard::Open | Guard::CoolingDown(_) => {}
        }

        cycle.guard = Guard::Running;
        Ok(InFlight {
            engine: self,
            cool_down: true,
        })
    }

    async fn run_cycle(
        &self,
        endpoint: &Endpoint,
        local: &Collection,
        base_version: u64,
    ) -> std::result::Result<(SyncReport, Fingerprint), SyncError> {
        let remote = self.remote.fetch_all(endpoint).await?;
        let Reconciliation {
            merged,
            push_upstream,
        } = reconcile(local, &remote);

        if push_upstream.is_empty() {
            self.log.debug("Nothing to push");
        } else {
            self.remote.push_subset(endpoint, &push_upstream).await?;
        }

        let mut report = SyncReport {
            fetched: remote.len(),
            pushed: push_upstream.len(),
            merged: merged.len(),
            rebased: false,
        };
        let fingerprint = merged.fingerprint();
        report.rebased = self.commit_merge(merged, base_version).await?;
        Ok((report, fingerprint))
    }

    /// Persist and publish a merge result. Edits made since `base_version`
    /// are reconciled on top so they are not overwritten.
    async fn commit_merge(
        &self,
        merged: Collection,
        base_version: u64,
    ) -> std::result::Result<bool, SyncError> {
        let _write = self.writes.lock().await;
        let rebased = {
            let state = self.notes.borrow();
            (state.version != base_version).then(|| reconcile(&state.notes, &merged).merged)
        };
        let was_rebased = rebased.is_some();
        if was_rebased {
            self.log
                .debug("Local edits landed during sync; merging them on top");
        }

        let next = rebased.unwrap_or(merged);
        self.store.save(&next).await.map_err(SyncError::Storage)?;
        self.publish(next, ChangeOrigin::Sync);
        Ok(was_rebased)
    }

    fn record_success(&self, fingerprint: Fingerprint) {
        {
            let mut cycle = self.cycle();
            cycle.last_success = Some(Instant::now());
            cycle.last_fingerprint = Some(fingerprint);
        }
        self.update_status(|status| {
            status.phase = SyncPhase::Idle;
            status.last_synced_at = Some(unix_millis_now());
            status.last_error = None;
            status.offline = false;
            status.retry_count = 0;
            status.suspended = false;
        });
    }

    fn record_failure(&self, error: &SyncError) {
        let message = error.to_string();
        let max_retries = self.settings.max_retries;
        self.update_status(|status| {
            status.last_error = Some(message.clone());
            match error {
                SyncError::Offline => {
                    status.phase = SyncPhase::Offline;
                    status.offline = true;
                }
                SyncError::ServerOrNetwork(_) => {
                    status.retry_count = status.retry_count.saturating_add(1).min(max_retries);
                    status.phase = SyncPhase::Backoff(status.retry_count);
                    status.suspended = status.retry_count >= max_retries;
                }
                SyncError::Client { .. }
                | SyncError::MalformedData(_)
                | SyncError::Storage(_) => {
                    status.phase = SyncPhase::Idle;
                }
            }
        });

        match error {
            SyncError::Offline => self.log.warning("Sync skipped: device is offline"),
            SyncError::ServerOrNetwork(_) => {
                let status = self.status();
                if status.suspended {
                    self.log.error(&format!(
                        "Sync failed {} times, pausing periodic sync: {message}",
                        status.retry_count
                    ));
                } else {
                    self.log.warning(&format!(
                        "Sync failed (attempt {}): {message}",
                        status.retry_count
                    ));
                }
            }
            _ => self.log.error(&format!("Sync failed: {message}")),
        }
    }

    /// Record a connectivity transition reported by the monitor.
    pub fn set_offline(&self, offline: bool) {
        self.update_status(|status| {
            status.offline = offline;
            if offline {
                status.phase = SyncPhase::Offline;
            } else if status.phase == SyncPhase::Offline {
                status.phase = SyncPhase::Idle;
            }
        });
    }

    /// Clear the retry counter and lift a suspension.
    pub fn resume(&self) {
        self.update_status(|status| {
            status.retry_count = 0;
            status.suspended = false;
            if matches!(status.phase, SyncPhase::Backoff(_)) {
                status.phase = SyncPhase::Idle;
            }
        });
    }

    /// Insert or replace a note. The stored copy is guaranteed a newer
    /// `updated_at` than the one it replaces.
    pub async fn upsert_note(&self, note: Note) -> Result<Note> {
        if note.id.is_blank() {
            return Err(Error::InvalidInput("note id must not be blank".to_string()));
        }
        self.mutate(move |notes| {
            let mut note = note;
            if let Some(existing) = notes.get(&note.id) {
                if note.updated_at <= existing.updated_at {
                    note.updated_at = existing.updated_at;
                    note.touch();
                }
            }
            notes.insert(note.clone());
            Ok(note)
        })
        .await
    }

    /// Apply `change` to a live note and bump it.
    pub async fn update_note<T, F>(&self, id: &NoteId, change: F) -> Result<T>
    where
        F: FnOnce(&mut Note) -> Result<T> + Send,
        T: Send,
    {
        self.mutate(|notes| {
            let note = notes
                .get_mut(id)
                .filter(|note| !note.deleted)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let before = note.updated_at;
            let value = change(note)?;
            if note.updated_at <= before {
                note.touch();
            }
            Ok(value)
        })
        .await
    }

    /// Tombstone a note. Returns the tombstone.
    pub async fn delete_note(&self, id: &NoteId) -> Result<Note> {
        self.update_note(id, |note| {
            note.mark_deleted();
            Ok(note.clone())
        })
        .await
    }

    /// Swap the whole collection, e.g. after an import.
    pub async fn replace_collection(&self, notes: Collection) -> Result<()> {
        self.mutate(|current| {
            *current = notes;
            Ok(())
        })
        .await
    }

    async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<T> + Send,
        T: Send,
    {
        let _write = self.writes.lock().await;
        let mut notes = self.notes();
        let value = change(&mut notes)?;
        self.store.save(&notes).await?;
        self.publish(notes, ChangeOrigin::Local);
        Ok(value)
    }

    fn publish(&self, notes: Collection, origin: ChangeOrigin) {
        self.notes.send_modify(|state| {
            state.notes = notes;
            state.version = state.version.wrapping_add(1);
            state.origin = origin;
        });
    }

    fn update_status(&self, change: impl FnOnce(&mut SyncStatus)) {
        self.status.send_if_modified(|status| {
            let before = status.clone();
            change(status);
            *status != before
        });
    }

    fn cycle(&self) -> MutexGuard<'_, CycleState> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
