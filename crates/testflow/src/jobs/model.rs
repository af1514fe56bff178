use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work type used when a request does not name one.
pub const FULL_SUITE: &str = "FullSuite";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_filter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_slot: Option<String>,
}

/// Row shape as stored in Postgres. Status is kept as text so an
/// unexpected value surfaces as a decode error instead of a panic.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub job_type: String,
    pub test_filter: Option<String>,
    pub status: String,
    pub result_id: Option<Uuid>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub schedule_slot: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = UnknownStatus;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            project_id: row.project_id,
            job_type: row.job_type,
            status: row.status.parse()?,
            test_filter: row.test_filter,
            created_at: row.created_at,
            updated_at: row.updated_at,
            result_id: row.result_id,
            lease_expires_at: row.lease_expires_at,
            schedule_slot: row.schedule_slot,
        })
    }
}

/// Input to `JobStore::insert`. Built by the coordinator, which applies the
/// defaulting rules before anything reaches the store.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub project_id: Option<Uuid>,
    pub job_type: String,
    pub test_filter: Option<String>,
    pub schedule_slot: Option<String>,
}

impl NewJob {
    /// Normalise raw request fields.
    ///
    /// - empty or blank `job_type` becomes [`FULL_SUITE`]
    /// - a `project_id` that is not a UUID is dropped rather than rejected
    /// - an empty `test_filter` is treated as absent
    pub fn from_request(
        job_type: Option<&str>,
        project_id: Option<&str>,
        test_filter: Option<&str>,
    ) -> Self {
        let job_type = job_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(FULL_SUITE)
            .to_string();

        let project_id = project_id
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .and_then(|p| Uuid::parse_str(p).ok());

        let test_filter = test_filter
            .filter(|f| !f.trim().is_empty())
            .map(str::to_string);

        Self {
            project_id,
            job_type,
            test_filter,
            schedule_slot: None,
        }
    }

    pub fn scheduled(slot: impl Into<String>) -> Self {
        Self {
            project_id: None,
            job_type: FULL_SUITE.to_string(),
            test_filter: None,
            schedule_slot: Some(slot.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    /// Statuses a job may hold immediately before moving to `self` under the
    /// strict lifecycle `Pending -> Processing -> {Completed, Failed}`.
    pub fn legal_predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Processing],
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Job totals per status, as returned by `JobStore::count_by_status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: JobStatus, n: i64) {
        match status {
            JobStatus::Pending => self.pending += n,
            JobStatus::Processing => self.processing += n,
            JobStatus::Completed => self.completed += n,
            JobStatus::Failed => self.failed += n,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed
    }
}
