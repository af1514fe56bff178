use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{QueueError, Result, StoreError};
use crate::jobs::model::{Job, JobStatus, NewJob, StatusCounts};
use crate::jobs::store::JobStore;

/// How `update_status` treats the requested transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Any status may be written to any job, and a missing job is not an
    /// error. This is what polling workers have always relied on.
    #[default]
    Permissive,
    /// Only `Pending -> Processing -> {Completed, Failed}` is accepted.
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    pub transitions: TransitionPolicy,
    /// Lease granted with each claim. `None` means a claimed job stays
    /// Processing until someone reports a status.
    pub lease: Option<Duration>,
}

/// Owns the job lifecycle on top of a [`JobStore`].
#[derive(Clone)]
pub struct QueueCoordinator {
    store: Arc<dyn JobStore>,
    opts: QueueOptions,
}

impl QueueCoordinator {
    pub fn new(store: Arc<dyn JobStore>, opts: QueueOptions) -> Self {
        Self { store, opts }
    }

    /// Queue a new Pending job. Blank `job_type` means full suite; a
    /// `project_id` that does not parse is dropped, not rejected.
    pub async fn enqueue(
        &self,
        job_type: Option<&str>,
        project_id: Option<&str>,
        test_filter: Option<&str>,
    ) -> Result<Job> {
        let new = NewJob::from_request(job_type, project_id, test_filter);
        if new.project_id.is_none() && project_id.is_some_and(|p| !p.trim().is_empty()) {
            tracing::warn!(
                project_id = project_id.unwrap_or_default(),
                "ignoring malformed project id"
            );
        }

        let Some(job) = self.store.insert(new).await? else {
            return Err(StoreError::Corrupt(
                "insert without schedule slot reported a conflict".into(),
            )
            .into());
        };

        tracing::info!(job_id = %job.id, job_type = %job.job_type, "job queued");
        Ok(job)
    }

    /// Queue a full-suite job for a schedule slot. `None` if that slot was
    /// already queued, by this process or another instance.
    pub async fn enqueue_scheduled(&self, slot: &str) -> Result<Option<Job>> {
        let job = self.store.insert(NewJob::scheduled(slot)).await?;
        match &job {
            Some(j) => tracing::info!(job_id = %j.id, slot, "scheduled job queued"),
            None => tracing::info!(slot, "schedule slot already queued, skipping"),
        }
        Ok(job)
    }

    /// Hand the oldest Pending job to the caller. `Ok(None)` means there is
    /// no work, which is a normal outcome.
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        let job = self.store.claim_oldest_pending(self.opts.lease).await?;
        if let Some(j) = &job {
            tracing::info!(job_id = %j.id, job_type = %j.job_type, "job claimed");
        }
        Ok(job)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        result_id: Option<Uuid>,
    ) -> Result<()> {
        match self.opts.transitions {
            TransitionPolicy::Permissive => {
                let n = self.store.set_status(id, status, result_id, None).await?;
                if n == 0 {
                    tracing::debug!(job_id = %id, %status, "status update matched no job");
                }
            }
            TransitionPolicy::Strict => {
                let n = self
                    .store
                    .set_status(id, status, result_id, Some(status.legal_predecessors()))
                    .await?;
                if n == 0 {
                    return Err(match self.store.get(id).await? {
                        None => QueueError::NotFound(id),
                        Some(current) => QueueError::InvalidTransition {
                            id,
                            from: current.status,
                            to: status,
                        },
                    });
                }
            }
        }

        tracing::info!(job_id = %id, %status, "job status updated");
        Ok(())
    }

    /// Delete every job regardless of status.
    pub async fn clear(&self) -> Result<u64> {
        let n = self.store.delete_all().await?;
        tracing::warn!(deleted = n, "job queue cleared");
        Ok(n)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job> {
        self.store.get(id).await?.ok_or(QueueError::NotFound(id))
    }

    pub async fn list_jobs(&self, status: Option<JobStatus>, limit: i64) -> Result<Vec<Job>> {
        Ok(self.store.list(status, limit).await?)
    }

    pub async fn counts(&self) -> Result<StatusCounts> {
        Ok(self.store.count_by_status().await?)
    }

    /// Put Processing jobs with an expired lease back in the queue.
    pub async fn requeue_expired(&self) -> Result<u64> {
        Ok(self.store.requeue_expired().await?)
    }
}
