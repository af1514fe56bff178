use chrono::{DateTime, SecondsFormat, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

use crate::jobs::model::Job;
use crate::jobs::queue::QueueCoordinator;

/// Every day at 18:00 UTC. Fields: sec min hour day-of-month month day-of-week.
pub const DEFAULT_SCHEDULE: &str = "0 0 18 * * *";

/// Queues a full-suite run on a cron schedule.
///
/// Each firing carries a slot key derived from the expression and the fire
/// time, so a restarted process or a second instance firing the same slot
/// does not queue a duplicate.
pub struct ScheduleTrigger {
    queue: QueueCoordinator,
    expression: String,
    schedule: Schedule,
}

impl ScheduleTrigger {
    pub fn new(queue: QueueCoordinator, expression: &str) -> anyhow::Result<Self> {
        let schedule = Schedule::from_str(expression)
            .map_err(|e| anyhow::anyhow!("invalid schedule {expression:?}: {e}"))?;

        Ok(Self {
            queue,
            expression: expression.to_string(),
            schedule,
        })
    }

    /// First fire time strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn slot_key(&self, fire_at: DateTime<Utc>) -> String {
        format!(
            "{}@{}",
            self.expression,
            fire_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// Queue the job for one slot. `Ok(None)` if it was already queued.
    pub async fn fire(&self, fire_at: DateTime<Utc>) -> crate::error::Result<Option<Job>> {
        self.queue.enqueue_scheduled(&self.slot_key(fire_at)).await
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(schedule = %self.expression, "scheduler started");

        loop {
            let now = Utc::now();
            let Some(fire_at) = self.next_fire_after(now) else {
                tracing::warn!(schedule = %self.expression, "schedule has no upcoming fire time");
                break;
            };
            let wait = (fire_at - now).to_std().unwrap_or_default();
            tracing::debug!(next = %fire_at, "scheduler sleeping until next slot");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            tracing::info!(slot = %fire_at, "scheduler: queueing daily automation job");
            if let Err(e) = self.fire(fire_at).await {
                tracing::error!(error = %e, slot = %fire_at, "scheduler failed to queue job");
            }
        }

        tracing::debug!("scheduler stopped");
    }
}
