//! Connection monitor: periodic `status()` poll that owns the "backend connected" flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::backend::{Backend, ConnectionStats};
use crate::error::BackendResult;
use crate::poller::{Poller, PollerHandle};

pub const DEFAULT_CONNECTION_POLL: Duration = Duration::from_secs(30);

/// Shared connection flag plus the latest stats.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    connected: Arc<AtomicBool>,
    stats: Arc<watch::Sender<ConnectionStats>>,
}

impl ConnectionState {
    pub fn new(connected: bool) -> Self {
        let (stats, _) = watch::channel(ConnectionStats {
            connected,
            ..Default::default()
        });
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
            stats: Arc::new(stats),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::SeqCst);
        if was != connected {
            if connected {
                tracing::info!(target: "ozone::connection", "🟢 backend connected");
            } else {
                tracing::warn!(target: "ozone::connection", "🔴 backend disconnected");
            }
        }
        self.stats.send_if_modified(|s| {
            let changed = s.connected != connected;
            s.connected = connected;
            changed
        });
    }

    pub fn publish(&self, stats: ConnectionStats) {
        self.set_connected(stats.connected);
        self.stats.send_replace(stats);
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStats> {
        self.stats.subscribe()
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(false)
    }
}

pub struct ConnectionMonitor;

impl ConnectionMonitor {
    /// One status check. Failure marks the backend disconnected and is returned for logging.
    pub async fn check(backend: &dyn Backend, state: &ConnectionState) -> BackendResult<()> {
        match backend.status().await {
            Ok(stats) => {
                state.publish(stats);
                Ok(())
            }
            Err(e) => {
                state.set_connected(false);
                Err(e)
            }
        }
    }

    /// Start polling; the first check runs immediately.
    pub fn start(backend: Arc<dyn Backend>, state: ConnectionState, period: Duration) -> PollerHandle {
        Poller::spawn("connection", period, move || {
            let backend = Arc::clone(&backend);
            let state = state.clone();
            async move { Self::check(backend.as_ref(), &state).await }
        })
    }
}
