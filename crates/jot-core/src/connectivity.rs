//! Connectivity monitoring.
//!
//! The orchestrator never touches the network to decide whether it is online;
//! it asks a [`ConnectivityMonitor`] and listens to its transitions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::remote::Endpoint;

/// A connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Connected,
    Disconnected,
}

impl ConnectivityEvent {
    const fn from_connected(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

/// Source of truth for "can we reach the network right now".
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Start receiving transitions. Dropping the subscription unsubscribes.
    fn subscribe(&self) -> ConnectivitySubscription;
}

/// Stream of connectivity transitions; repeated reports of the same state are
/// swallowed.
#[derive(Debug)]
pub struct ConnectivitySubscription {
    rx: watch::Receiver<bool>,
    last: bool,
}

impl ConnectivitySubscription {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        let last = *rx.borrow();
        Self { rx, last }
    }

    /// State as of the last observed transition.
    pub const fn current(&self) -> bool {
        self.last
    }

    /// Wait for the next transition. `None` once the monitor has gone away.
    pub async fn next(&mut self) -> Option<ConnectivityEvent> {
        loop {
            self.rx.changed().await.ok()?;
            let connected = *self.rx.borrow_and_update();
            if connected != self.last {
                self.last = connected;
                return Some(ConnectivityEvent::from_connected(connected));
            }
        }
    }
}

/// Connectivity reported by the host (platform network callbacks, tests).
#[derive(Debug)]
pub struct ManualConnectivity {
    state: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(connected);
        Self { state }
    }

    pub fn set_connected(&self, connected: bool) {
        let previous = self.state.send_replace(connected);
        if previous != connected {
            tracing::debug!(connected, "Connectivity changed");
        }
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityMonitor for ManualConnectivity {
    async fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> ConnectivitySubscription {
        ConnectivitySubscription::new(self.state.subscribe())
    }
}

const DEFAULT_PROBE_PERIOD: Duration = Duration::from_secs(15);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Polls TCP reachability of the notes server in the background.
///
/// The probe task lives as long as this value and is aborted on drop.
pub struct ProbeConnectivity {
    target: ProbeTarget,
    timeout: Duration,
    state: Arc<watch::Sender<bool>>,
    task: JoinHandle<()>,
}

#[derive(Debug, Clone)]
struct ProbeTarget {
    host: String,
    port: u16,
}

impl ProbeConnectivity {
    /// Probe the host serving `endpoint` with default period and timeout.
    pub fn for_endpoint(endpoint: &Endpoint) -> Option<Self> {
        Some(Self::spawn(
            endpoint.host()?,
            endpoint.port()?,
            DEFAULT_PROBE_PERIOD,
            DEFAULT_PROBE_TIMEOUT,
        ))
    }

    /// Must be called from within a tokio runtime.
    pub fn spawn(host: impl Into<String>, port: u16, period: Duration, timeout: Duration) -> Self {
        let target = ProbeTarget {
            host: host.into(),
            port,
        };
        let (state, _) = watch::channel(true);
        let state = Arc::new(state);

        let task = {
            let target = target.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let connected = probe(&target, timeout).await;
                    publish(&state, connected);
                }
            })
        };

        Self {
            target,
            timeout,
            state,
            task,
        }
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl ConnectivityMonitor for ProbeConnectivity {
    async fn is_connected(&self) -> bool {
        let connected = probe(&self.target, self.timeout).await;
        publish(&self.state, connected);
        connected
    }

    fn subscribe(&self) -> ConnectivitySubscription {
        ConnectivitySubscription::new(self.state.subscribe())
    }
}

fn publish(state: &watch::Sender<bool>, connected: bool) {
    let changed = state.send_if_modified(|current| {
        if *current == connected {
            false
        } else {
            *current = connected;
            true
        }
    });
    if changed {
        tracing::info!(connected, "Connectivity changed");
    }
}

async fn probe(target: &ProbeTarget, timeout: Duration) -> bool {
    let address = (target.host.as_str(), target.port);
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(error)) => {
            tracing::debug!(host = %target.host, port = target.port, %error, "Connectivity probe failed");
            false
        }
        Err(_) => {
            tracing::debug!(host = %target.host, port = target.port, "Connectivity probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_connectivity_reports_transitions_only() {
        let monitor = ManualConnectivity::new(true);
        let mut events = monitor.subscribe();

        monitor.set_connected(true);
        monitor.set_connected(false);
        assert_eq!(events.next().await, Some(ConnectivityEvent::Disconnected));
        assert!(!monitor.is_connected().await);

        monitor.set_connected(false);
        monitor.set_connected(true);
        assert_eq!(events.next().await, Some(ConnectivityEvent::Connected));
        assert!(events.current());
    }

    #[tokio::test]
    async fn subscription_ends_when_monitor_is_dropped() {
        let monitor = ManualConnectivity::new(false);
        let mut events = monitor.subscribe();
        drop(monitor);
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn probe_detects_listener_going_away() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let monitor = ProbeConnectivity::spawn(
            "127.0.0.1",
            port,
            Duration::from_secs(3600),
            Duration::from_millis(500),
        );

        assert!(monitor.is_connected().await);

        let mut events = monitor.subscribe();
        drop(listener);
        assert!(!monitor.is_connected().await);
        assert_eq!(events.next().await, Some(ConnectivityEvent::Disconnected));
    }
}
