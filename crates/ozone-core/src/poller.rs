//! Cancellable periodic task shared by the affect, microphone and connection pollers.
//!
//! The first iteration runs immediately; later ones follow the period. A failed
//! iteration is logged and the loop carries on. Dropping the [`PollerHandle`]
//! aborts the task, so a poller can never outlive its owner.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct Poller;

impl Poller {
    /// Spawn `tick` every `period` on the current tokio runtime.
    pub fn spawn<F, Fut, E>(name: &'static str, period: Duration, mut tick: F) -> PollerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = tick().await {
                    tracing::warn!(target: "ozone::poller", poller = name, error = %e, "poll iteration failed");
                }
            }
        });
        tracing::debug!(target: "ozone::poller", poller = name, period_ms = period.as_millis() as u64, "poller started");
        PollerHandle { name, task }
    }
}

/// Owner of a running poller. Abort-on-drop.
#[derive(Debug)]
pub struct PollerHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the poller. Same as dropping the handle, but logged.
    pub fn cancel(self) {
        tracing::debug!(target: "ozone::poller", poller = self.name, "poller cancelled");
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_immediate_then_periodic() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = Poller::spawn("test", Duration::from_millis(500), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_iteration_does_not_stop_poller() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _handle = Poller::spawn("failing", Duration::from_secs(5), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("backend unreachable")
            }
        });

        tokio::time::sleep(Duration::from_millis(10_010)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = Poller::spawn("cancel", Duration::from_millis(100), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.cancel();
        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
