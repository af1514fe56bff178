use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::jobs::queue::QueueCoordinator;

/// Periodically returns jobs with an expired lease to the queue.
///
/// Only meaningful when the coordinator hands out leases; with leasing off
/// there is never anything to reap and the caller should not spawn this.
pub struct LeaseReaper {
    queue: QueueCoordinator,
    interval: Duration,
}

impl LeaseReaper {
    pub fn new(queue: QueueCoordinator, interval: Duration) -> Self {
        Self { queue, interval }
    }

    /// One reap pass. Errors are logged and swallowed so the loop survives a
    /// store outage.
    pub async fn tick(&self) -> u64 {
        match self.queue.requeue_expired().await {
            Ok(n) => {
                if n > 0 {
                    tracing::warn!(requeued = n, "requeued jobs with expired leases");
                }
                n
            }
            Err(e) => {
                tracing::error!(error = %e, "lease reap failed");
                0
            }
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::debug!("lease reaper stopped");
    }
}
