use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::jobs::model::{Job, JobStatus, NewJob, StatusCounts};

/// Longest lease a claim may carry.
pub const MAX_LEASE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Reject leases above [`MAX_LEASE`] and convert the rest for timestamp math.
pub(crate) fn checked_lease(
    lease: Option<Duration>,
) -> Result<Option<chrono::Duration>, StoreError> {
    lease
        .map(|d| {
            if d > MAX_LEASE {
                return Err(StoreError::LeaseOutOfRange(d));
            }
            chrono::Duration::from_std(d).map_err(|_| StoreError::LeaseOutOfRange(d))
        })
        .transpose()
}

/// Persistent home of job records.
///
/// The coordinator never keeps jobs in memory between calls; everything goes
/// through this trait. Implementations must make `claim_oldest_pending` a
/// single atomic conditional update.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Insert a Pending job stamped with the store's clock.
    ///
    /// Returns `None` only when `job.schedule_slot` is set and a job for that
    /// slot already exists.
    async fn insert(&self, job: NewJob) -> Result<Option<Job>, StoreError>;

    /// Atomically move the oldest Pending job to Processing and return the
    /// updated record. Order is `created_at` ascending with a stable
    /// tie-break. With `lease` set, `lease_expires_at` becomes now + lease.
    async fn claim_oldest_pending(&self, lease: Option<Duration>)
        -> Result<Option<Job>, StoreError>;

    /// Set status and `updated_at`, clear any lease, and set `result_id` when
    /// given. With `only_from`, the row is touched only if its current status
    /// is in that set. Returns the number of rows changed.
    async fn set_status(
        &self,
        id: Uuid,
        status: JobStatus,
        result_id: Option<Uuid>,
        only_from: Option<&[JobStatus]>,
    ) -> Result<u64, StoreError>;

    async fn delete_all(&self) -> Result<u64, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Newest first.
    async fn list(&self, status: Option<JobStatus>, limit: i64) -> Result<Vec<Job>, StoreError>;

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError>;

    /// Return Processing jobs whose lease has run out to Pending.
    async fn requeue_expired(&self) -> Result<u64, StoreError>;
}
