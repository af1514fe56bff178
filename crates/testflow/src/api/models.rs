// crates/testflow/src/api/models.rs
use serde::{Deserialize, Serialize};

/// Response envelope shared by every `/api` route except `/worker-status`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJobRequest {
    pub project_id: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub test_filter: Option<String>,
}

/// Ids and status arrive as plain strings so a bad value can be reported
/// as a validation failure instead of a generic body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub id: String,
    pub status: String,
    pub result_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub deleted: u64,
}
