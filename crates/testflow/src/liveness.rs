use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::RwLock;

/// Default staleness window for worker heartbeats, in seconds.
pub const DEFAULT_THRESHOLD_SECS: i64 = 15;

/// Tracks the last time any worker reported in.
///
/// The tracker is not keyed by worker: it answers "has some worker been
/// active recently", nothing more. State lives only in this process and
/// starts as never seen.
#[derive(Debug)]
pub struct LivenessTracker {
    last_seen: RwLock<Option<DateTime<Utc>>>,
    threshold: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_THRESHOLD_SECS))
    }
}

impl LivenessTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            last_seen: RwLock::new(None),
            threshold,
        }
    }

    pub fn record_heartbeat(&self) {
        self.record_heartbeat_at(Utc::now());
    }

    pub fn record_heartbeat_at(&self, at: DateTime<Utc>) {
        // a poisoned lock still holds a valid timestamp
        let mut guard = self.last_seen.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(at);
    }

    pub fn status(&self) -> WorkerStatus {
        self.status_at(Utc::now())
    }

    /// Online iff `now - last_seen` is strictly below the threshold.
    pub fn status_at(&self, now: DateTime<Utc>) -> WorkerStatus {
        let last_seen = *self.last_seen.read().unwrap_or_else(|e| e.into_inner());
        let online = last_seen.is_some_and(|seen| now - seen < self.threshold);
        WorkerStatus { online, last_seen }
    }
}
