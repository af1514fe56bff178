use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::api::models::{
    ApiResponse, ClearResponse, ListJobsQuery, QueueJobRequest, UpdateStatusRequest,
};
use crate::error::QueueError;
use crate::jobs::model::JobStatus;
use crate::jobs::QueueCoordinator;
use crate::liveness::LivenessTracker;

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub queue: QueueCoordinator,
    pub liveness: Arc<LivenessTracker>,
}

pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        // Job queue
        .route("/queue-job", post(queue_job))
        .route("/run-test", post(queue_job))
        .route("/jobs", get(list_jobs))
        .route("/jobs/next", get(next_job))
        .route("/jobs/counts", get(job_counts))
        .route("/jobs/update-status", post(update_status))
        .route("/jobs/queue", delete(clear_queue))
        .route("/jobs/:id", get(get_job))
        // Worker liveness
        .route("/worker-heartbeat", post(worker_heartbeat))
        .route("/worker-status", get(worker_status));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .with_state(state)
}

/// `router` plus CORS and request tracing, as served by the binary.
pub fn app(state: ApiState, allowed_origin: &str) -> anyhow::Result<Router> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let cors = if allowed_origin.trim() == "*" {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(HeaderValue::from_str(allowed_origin.trim())?)
    };

    Ok(router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Error side of every envelope handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Validation { .. } => ApiError::bad_request(e.to_string()),
            QueueError::NotFound(_) => ApiError {
                status: StatusCode::NOT_FOUND,
                message: e.to_string(),
            },
            QueueError::InvalidTransition { .. } => ApiError {
                status: StatusCode::CONFLICT,
                message: e.to_string(),
            },
            QueueError::Store(store) => {
                // keep driver detail in the log, not in the response
                tracing::error!(error = %store, "store operation failed");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal store error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::message(false, self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// An absent or empty body means "all defaults"; anything else must be JSON.
fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid request body"))
}

fn parse_uuid(field: &'static str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| QueueError::validation(field, raw).into())
}

pub async fn queue_job(State(state): State<ApiState>, body: Bytes) -> ApiResult<&'static str> {
    let req: QueueJobRequest = parse_optional_body(&body)?;

    state
        .queue
        .enqueue(
            req.job_type.as_deref(),
            req.project_id.as_deref(),
            req.test_filter.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::ok("Job queued successfully")))
}

pub async fn next_job(State(state): State<ApiState>) -> Result<Response, ApiError> {
    match state.queue.claim_next().await? {
        Some(job) => Ok((StatusCode::OK, Json(ApiResponse::ok(job))).into_response()),
        None => Ok((
            StatusCode::NO_CONTENT,
            Json(json!({ "message": "No jobs pending" })),
        )
            .into_response()),
    }
}

pub async fn update_status(
    State(state): State<ApiState>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(req) = body.map_err(|_| ApiError::bad_request("Invalid request body"))?;

    let id = parse_uuid("id", &req.id)?;
    let status: JobStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::from(QueueError::validation("status", &req.status)))?;
    let result_id = req
        .result_id
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(|r| parse_uuid("resultId", r))
        .transpose()?;

    state.queue.update_status(id, status, result_id).await?;

    Ok(Json(ApiResponse::ok("Job status updated")))
}

pub async fn clear_queue(State(state): State<ApiState>) -> ApiResult<ClearResponse> {
    let deleted = state.queue.clear().await?;
    Ok(Json(ApiResponse::ok(ClearResponse { deleted })))
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    query: Result<Query<ListJobsQuery>, QueryRejection>,
) -> ApiResult<Vec<crate::jobs::Job>> {
    let Query(q) = query.map_err(|_| ApiError::bad_request("Invalid query string"))?;
    let status = q
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<JobStatus>()
                .map_err(|_| ApiError::from(QueueError::validation("status", s)))
        })
        .transpose()?;

    let jobs = state
        .queue
        .list_jobs(status, q.limit.unwrap_or(100))
        .await?;
    Ok(Json(ApiResponse::ok(jobs)))
}

pub async fn job_counts(
    State(state): State<ApiState>,
) -> ApiResult<crate::jobs::model::StatusCounts> {
    Ok(Json(ApiResponse::ok(state.queue.counts().await?)))
}

pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<crate::jobs::Job> {
    let id = parse_uuid("id", &id)?;
    Ok(Json(ApiResponse::ok(state.queue.get_job(id).await?)))
}

pub async fn worker_heartbeat(State(state): State<ApiState>) -> impl IntoResponse {
    state.liveness.record_heartbeat();
    Json(ApiResponse::message(true, "Heartbeat acknowledged"))
}

pub async fn worker_status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.liveness.status())
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
