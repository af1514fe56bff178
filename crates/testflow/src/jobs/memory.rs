use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::jobs::model::{Job, JobStatus, NewJob, StatusCounts};
use crate::jobs::store::{checked_lease, JobStore};

/// Process-local job store.
///
/// Every operation runs under one lock, so a claim is a single critical
/// section. Ties on `created_at` are broken by insertion order.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    entries: Vec<Entry>,
}

struct Entry {
    seq: u64,
    job: Job,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, new: NewJob) -> Result<Option<Job>, StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(slot) = new.schedule_slot.as_deref() {
            let taken = inner
                .entries
                .iter()
                .any(|e| e.job.schedule_slot.as_deref() == Some(slot));
            if taken {
                return Ok(None);
            }
        }

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            project_id: new.project_id,
            job_type: new.job_type,
            status: JobStatus::Pending,
            test_filter: new.test_filter,
            created_at: now,
            updated_at: now,
            result_id: None,
            lease_expires_at: None,
            schedule_slot: new.schedule_slot,
        };

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push(Entry {
            seq,
            job: job.clone(),
        });

        Ok(Some(job))
    }

    async fn claim_oldest_pending(
        &self,
        lease: Option<Duration>,
    ) -> Result<Option<Job>, StoreError> {
        let lease = checked_lease(lease)?;

        let mut inner = self.inner.lock().await;

        let Some(entry) = inner
            .entries
            .iter_mut()
            .filter(|e| e.job.status == JobStatus::Pending)
            .min_by_key(|e| (e.job.created_at, e.seq))
        else {
            return Ok(None);
        };

        let now = Utc::now();
        entry.job.status = JobStatus::Processing;
        entry.job.updated_at = now;
        entry.job.lease_expires_at = lease.map(|d| now + d);

        Ok(Some(entry.job.clone()))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: JobStatus,
        result_id: Option<Uuid>,
        only_from: Option<&[JobStatus]>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;

        let Some(entry) = inner.entries.iter_mut().find(|e| e.job.id == id) else {
            return Ok(0);
        };

        if let Some(allowed) = only_from {
            if !allowed.contains(&entry.job.status) {
                return Ok(0);
            }
        }

        entry.job.status = status;
        entry.job.updated_at = Utc::now();
        entry.job.lease_expires_at = None;
        if result_id.is_some() {
            entry.job.result_id = result_id;
        }

        Ok(1)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let n = inner.entries.len() as u64;
        inner.entries.clear();
        Ok(n)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .iter()
            .find(|e| e.job.id == id)
            .map(|e| e.job.clone()))
    }

    async fn list(&self, status: Option<JobStatus>, limit: i64) -> Result<Vec<Job>, StoreError> {
        let limit = limit.clamp(1, 500) as usize;
        let inner = self.inner.lock().await;

        let mut matching: Vec<&Entry> = inner
            .entries
            .iter()
            .filter(|e| status.map_or(true, |st| e.job.status == st))
            .collect();
        matching.sort_by(|a, b| {
            (b.job.created_at, b.seq).cmp(&(a.job.created_at, a.seq))
        });

        Ok(matching
            .into_iter()
            .take(limit)
            .map(|e| e.job.clone())
            .collect())
    }

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        let inner = self.inner.lock().await;
        let mut counts = StatusCounts::default();
        for e in &inner.entries {
            counts.add(e.job.status, 1);
        }
        Ok(counts)
    }

    async fn requeue_expired(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut n = 0;

        for e in inner.entries.iter_mut() {
            let expired = e.job.status == JobStatus::Processing
                && e.job.lease_expires_at.is_some_and(|at| at < now);
            if expired {
                e.job.status = JobStatus::Pending;
                e.job.lease_expires_at = None;
                e.job.updated_at = now;
                n += 1;
            }
        }

        Ok(n)
    }
}
