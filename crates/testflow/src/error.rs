use thiserror::Error;
use uuid::Uuid;

use crate::jobs::model::{JobStatus, UnknownStatus};

/// Failure talking to the record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt job record: {0}")]
    Corrupt(String),

    #[error("lease of {0:?} is out of range")]
    LeaseOutOfRange(std::time::Duration),
}

impl From<UnknownStatus> for StoreError {
    fn from(e: UnknownStatus) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("invalid {field}: {value:?}")]
    Validation { field: &'static str, value: String },

    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("illegal status transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueueError {
    pub fn validation(field: &'static str, value: impl Into<String>) -> Self {
        QueueError::Validation {
            field,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
