//! Single-owner cancellable timer.

use std::time::Duration;

use tokio::time::Instant;

/// A deadline that can be armed, re-armed or disarmed.
///
/// Re-arming replaces the previous deadline, so at most one timer per purpose
/// is ever pending. [`Deadline::fired`] is cancel safe and can sit in a
/// `tokio::select!` arm; a disarmed deadline never fires.
#[derive(Debug, Default)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub const fn new() -> Self {
        Self { at: None }
    }

    pub fn arm(&mut self, after: Duration) {
        self.at = Some(Instant::now() + after);
    }

    pub fn arm_at(&mut self, at: Instant) {
        self.at = Some(at);
    }

    /// Arm unless already due no later than `after` from now.
    pub fn arm_no_later_than(&mut self, after: Duration) {
        let at = Instant::now() + after;
        if self.at.is_none_or(|current| current > at) {
            self.at = Some(at);
        }
    }

    pub fn disarm(&mut self) {
        self.at = None;
    }

    pub const fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.at
    }

    /// Resolve when the deadline passes, then disarm. Pends forever while
    /// disarmed.
    pub async fn fired(&mut self) {
        match self.at {
            Some(at) => {
                tokio::time::sleep_until(at).await;
                self.at = None;
            }
            None => std::future::pending().await,
        }
    }
}
