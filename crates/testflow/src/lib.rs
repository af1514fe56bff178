//! Job queue and worker liveness service for distributed test runs.
//!
//! Workers poll `GET /api/jobs/next` to claim the oldest pending job,
//! report the outcome through `POST /api/jobs/update-status`, and signal
//! activity with `POST /api/worker-heartbeat`.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod liveness;
pub mod scheduler;
pub mod shutdown;

pub use error::{QueueError, StoreError};
