//! Background scheduling of sync cycles.
//!
//! A [`SyncDriver`] is one tokio task that owns every sync timer (debounce,
//! periodic, retry) and reacts to local edits, connectivity transitions, app
//! lifecycle changes and explicit requests. It only ever calls
//! [`SyncEngine::sync_notes`], so at most one cycle runs at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::engine::{ChangeOrigin, SyncEngine, SyncOutcome};
use super::error::SyncError;
use super::timer::Deadline;
use crate::connectivity::ConnectivityEvent;

/// Whether the host app is on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppLifecycle {
    #[default]
    Foreground,
    Background,
}

#[derive(Debug)]
enum Command {
    ForceSync,
    Lifecycle(AppLifecycle),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Forced,
    Foreground,
    Reconnected,
    LocalChange,
    Periodic,
    Stale,
    Backoff,
    OfflineRecheck,
    Deferred,
}

impl Trigger {
    const fn is_forced(self) -> bool {
        !matches!(self, Self::LocalChange | Self::Periodic | Self::Deferred)
    }
}

enum Wake {
    Command(Option<Command>),
    NotesChanged(bool),
    Connectivity(Option<ConnectivityEvent>),
    Debounce,
    Periodic,
    Retry,
}

/// Control handle for a running [`SyncDriver`].
///
/// Dropping the handle stops the driver as well.
pub struct SyncHandle {
    engine: Arc<SyncEngine>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub const fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Sync now, bypassing throttling. Ignored while a cycle is in flight.
    pub fn force_sync(&self) {
        self.send(Command::ForceSync);
    }

    pub fn set_lifecycle(&self, lifecycle: AppLifecycle) {
        self.send(Command::Lifecycle(lifecycle));
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the driver and wait for its task to exit. Pending timers are
    /// dropped; an in-flight cycle is allowed to finish first.
    pub async fn shutdown(mut self) {
        self.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "Sync driver task ended abnormally");
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Sync driver is no longer running");
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct SyncDriver {
    engine: Arc<SyncEngine>,
    lifecycle: AppLifecycle,
    debounce: Deadline,
    periodic: Deadline,
    retry: Deadline,
    retry_trigger: Trigger,
    last_change_sync: Option<Instant>,
}

impl SyncDriver {
    pub const fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            lifecycle: AppLifecycle::Foreground,
            debounce: Deadline::new(),
            periodic: Deadline::new(),
            retry: Deadline::new(),
            retry_trigger: Trigger::Deferred,
            last_change_sync: None,
        }
    }

    #[must_use]
    pub const fn with_lifecycle(mut self, lifecycle: AppLifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Start the driver task. Must be called from within a tokio runtime.
    pub fn spawn(self) -> SyncHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(self.run(receiver));
        SyncHandle {
            engine,
            commands,
            task: Some(task),
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut notes = self.engine.subscribe_notes();
        let mut connectivity = self.engine.connectivity().subscribe();
        let mut connectivity_open = true;

        tracing::debug!(lifecycle = ?self.lifecycle, "Sync driver started");
        self.arm_periodic();
        self.sync(Trigger::Startup).await;

        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                changed = notes.changed() => Wake::NotesChanged(changed.is_ok()),
                event = connectivity.next(), if connectivity_open => Wake::Connectivity(event),
                () = self.debounce.fired() => Wake::Debounce,
                () = self.periodic.fired() => Wake::Periodic,
                () = self.retry.fired() => Wake::Retry,
            };

            match wake {
                Wake::Command(None | Some(Command::Shutdown)) | Wake::NotesChanged(false) => break,
                Wake::Command(Some(Command::ForceSync)) => self.sync(Trigger::Forced).await,
                Wake::Command(Some(Command::Lifecycle(lifecycle))) => {
                    self.on_lifecycle(lifecycle).await;
                }
                Wake::NotesChanged(true) => {
                    let origin = notes.borrow_and_update().origin;
                    if origin == ChangeOrigin::Local {
                        self.schedule_change_sync();
                    }
                }
                Wake::Connectivity(Some(event)) => self.on_connectivity(event).await,
                Wake::Connectivity(None) => {
                    tracing::debug!("Connectivity monitor went away");
                    connectivity_open = false;
                }
                Wake::Debounce => self.sync(Trigger::LocalChange).await,
                Wake::Periodic => self.on_periodic().await,
                Wake::Retry => self.sync(self.retry_trigger).await,
            }
        }

        tracing::debug!("Sync driver stopped");
    }

    /// Debounce a local edit, never closer than `change_dwell` to the last
    /// edit-triggered sync.
    fn schedule_change_sync(&mut self) {
        let settings = self.engine.settings();
        let quiet_until = Instant::now() + settings.debounce;
        let at = self
            .last_change_sync
            .map(|last| last + settings.change_dwell)
            .map_or(quiet_until, |dwell_until| dwell_until.max(quiet_until));
        self.debounce.arm_at(at);
    }

    fn arm_periodic(&mut self) {
        let interval = self
            .engine
            .settings()
            .periodic_interval(self.lifecycle == AppLifecycle::Foreground);
        self.periodic.arm(interval);
    }

    async fn on_periodic(&mut self) {
        self.arm_periodic();
        let status = self.engine.status();
        if status.offline || status.suspended || self.backoff_pending() {
            tracing::debug!(
                offline = status.offline,
                suspended = status.suspended,
                backoff = self.backoff_pending(),
                "Skipping periodic sync"
            );
            return;
        }

        let foreground = self.lifecycle == AppLifecycle::Foreground;
        if self.engine.has_unsynced_changes() {
            self.sync(Trigger::Periodic).await;
        } else if self.engine.is_stale(self.engine.settings().stale_after(foreground)) {
            self.sync(Trigger::Stale).await;
        }
    }

    async fn on_lifecycle(&mut self, lifecycle: AppLifecycle) {
        if lifecycle == self.lifecycle {
            return;
        }
        tracing::debug!(?lifecycle, "App lifecycle changed");
        self.lifecycle = lifecycle;
        self.arm_periodic();
        if lifecycle == AppLifecycle::Foreground {
            self.sync(Trigger::Foreground).await;
        }
    }

    async fn on_connectivity(&mut self, event: ConnectivityEvent) {
        match event {
            ConnectivityEvent::Connected => {
                self.engine.set_offline(false);
                self.engine.resume();
                self.retry.disarm();
                self.sync(Trigger::Reconnected).await;
            }
            ConnectivityEvent::Disconnected => {
                self.engine.set_offline(true);
                self.retry.disarm();
            }
        }
    }

    async fn sync(&mut self, trigger: Trigger) {
        if !trigger.is_forced() && self.backoff_pending() {
            // The backoff retry reconciles the current collection, edits included.
            tracing::debug!(?trigger, "Waiting for backoff retry");
            return;
        }
        tracing::debug!(?trigger, "Sync triggered");
        let result = self.engine.sync_notes(trigger.is_forced(), None).await;
        if trigger == Trigger::LocalChange {
            self.last_change_sync = Some(Instant::now());
        }

        match result {
            Ok(SyncOutcome::Completed(report)) => {
                self.retry.disarm();
                // Edits merged on top of this cycle still need pushing.
                if report.rebased {
                    self.schedule_change_sync();
                }
            }
            Ok(SyncOutcome::Unchanged) => self.retry.disarm(),
            Ok(SyncOutcome::Throttled { retry_after } | SyncOutcome::Coalesced { retry_after }) => {
                if trigger == Trigger::Forced {
                    tracing::debug!(?trigger, "Sync already in flight; request coalesced");
                } else {
                    self.defer(retry_after, trigger);
                }
            }
            Ok(SyncOutcome::Disabled) => {
                self.debounce.disarm();
                self.retry.disarm();
            }
            Err(error) => self.after_failure(&error),
        }
    }

    fn backoff_pending(&self) -> bool {
        self.retry.is_armed() && self.retry_trigger == Trigger::Backoff
    }

    /// Retry `trigger` after `after`. Forced triggers keep their kind so the
    /// retry still bypasses the throttle; an unforced one never downgrades a
    /// forced retry that is already armed.
    fn defer(&mut self, after: Duration, trigger: Trigger) {
        tracing::debug!(
            ?trigger,
            delay_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            "Deferring sync"
        );
        let keep_armed = self.retry.is_armed() && self.retry_trigger.is_forced();
        if trigger.is_forced() {
            self.retry.arm_no_later_than(after);
            self.retry_trigger = trigger;
        } else if !keep_armed {
            self.retry.arm_no_later_than(after);
            self.retry_trigger = Trigger::Deferred;
        }
    }

    fn after_failure(&mut self, error: &SyncError) {
        let settings = self.engine.settings();
        match error {
            SyncError::Offline => {
                self.retry.arm(settings.backoff.ceiling);
                self.retry_trigger = Trigger::OfflineRecheck;
            }
            SyncError::ServerOrNetwork(_) => {
                let status = self.engine.status();
                if status.suspended {
                    self.retry.disarm();
                } else {
                    let delay = settings.backoff.delay(status.retry_count);
                    tracing::debug!(
                        retry = status.retry_count,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Backing off"
                    );
                    self.retry.arm(delay);
                    self.retry_trigger = Trigger::Backoff;
                }
            }
            SyncError::Client { .. } | SyncError::MalformedData(_) | SyncError::Storage(_) => {
                self.retry.disarm();
            }
        }
    }
}
