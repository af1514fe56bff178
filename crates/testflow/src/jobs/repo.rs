// crates/testflow/src/jobs/repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::jobs::model::{Job, JobRow, JobStatus, NewJob, StatusCounts};
use crate::jobs::store::{checked_lease, JobStore};

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode(row: JobRow) -> Result<Job, StoreError> {
    Ok(Job::try_from(row)?)
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: NewJob) -> Result<Option<Job>, StoreError> {
        // The partial unique index on schedule_slot makes a second insert for
        // the same slot a no-op. Jobs without a slot never conflict.
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, project_id, job_type, test_filter, status, schedule_slot)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (schedule_slot) WHERE schedule_slot IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job.project_id)
        .bind(&job.job_type)
        .bind(&job.test_filter)
        .bind(JobStatus::Pending.as_str())
        .bind(&job.schedule_slot)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    /// Claim exactly one Pending job.
    /// Uses SELECT ... FOR UPDATE SKIP LOCKED inside a single UPDATE so two
    /// callers can never be handed the same row.
    async fn claim_oldest_pending(
        &self,
        lease: Option<Duration>,
    ) -> Result<Option<Job>, StoreError> {
        let lease_ms = checked_lease(lease)?.map(|d| d.num_milliseconds());

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            WITH candidate AS (
              SELECT id
              FROM jobs
              WHERE status = 'Pending'
              ORDER BY created_at ASC, id ASC
              FOR UPDATE SKIP LOCKED
              LIMIT 1
            )
            UPDATE jobs j
            SET status = 'Processing',
                updated_at = now(),
                lease_expires_at = CASE
                    WHEN $1::bigint IS NULL THEN NULL
                    ELSE now() + ($1::bigint * interval '1 millisecond')
                END
            FROM candidate
            WHERE j.id = candidate.id
            RETURNING j.*
            "#,
        )
        .bind(lease_ms)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: JobStatus,
        result_id: Option<Uuid>,
        only_from: Option<&[JobStatus]>,
    ) -> Result<u64, StoreError> {
        let only_from: Option<Vec<String>> =
            only_from.map(|s| s.iter().map(|st| st.as_str().to_string()).collect());

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                updated_at = now(),
                lease_expires_at = NULL,
                result_id = COALESCE($3, result_id)
            WHERE id = $1
              AND ($4::text[] IS NULL OR status = ANY($4::text[]))
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(result_id)
        .bind(only_from)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM jobs").execute(&self.pool).await?;
        Ok(res.rows_affected())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode).transpose()
    }

    async fn list(&self, status: Option<JobStatus>, limit: i64) -> Result<Vec<Job>, StoreError> {
        let limit = limit.clamp(1, 500);

        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT *
            FROM jobs
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            counts.add(status.parse()?, n);
        }
        Ok(counts)
    }

    async fn requeue_expired(&self) -> Result<u64, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'Pending',
                lease_expires_at = NULL,
                updated_at = now()
            WHERE status = 'Processing'
              AND lease_expires_at IS NOT NULL
              AND lease_expires_at < now()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}
