//! Periodic eviction of client state that can no longer affect a decision.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace};

use super::limiter::RateLimit;

/// Smallest interval the sweeper will run at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background task that calls [`RateLimit::evict_expired`] on an interval.
///
/// The task stops when the sweeper is shut down or dropped.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping `limiter` every `interval` on the current tokio runtime.
    ///
    /// Must be called from within a runtime. The first sweep happens one full
    /// interval after spawning.
    pub fn spawn(limiter: Arc<RateLimit>, interval: Duration) -> Self {
        let period = interval.max(MIN_INTERVAL);
        info!(interval = ?period, kind = limiter.kind(), "Starting state sweeper");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = limiter.evict_expired();
                if removed > 0 {
                    info!(
                        removed,
                        remaining = limiter.tracked_clients(),
                        "Swept expired client state"
                    );
                } else {
                    trace!("Sweep found nothing to evict");
                }
            }
        });

        Self { handle }
    }

    /// Whether the background task has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the background task and wait for it to wind down.
    pub async fn shutdown(mut self) {
        self.handle.abort();
        // Cancellation is the expected outcome here.
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
