//! Pipeline failure taxonomy and job outcome

use salingtau_core::{MalformedPathError, TaskError};
use salingtau_db::RepositoryError;
use salingtau_storage::StorageError;
use serde::Serialize;
use uuid::Uuid;

/// How a job that ran to the end finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Results were attached to the owning record.
    Completed,
    /// The owning record does not exist, so nothing was attached. Files that
    /// were already produced stay in storage.
    OwnerMissing { owner_id: Uuid },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The staged blob is gone; only a new upload can fix this.
    #[error("Staged file not found: {path}")]
    MissingInput { path: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    MalformedPath(#[from] MalformedPathError),

    #[error("Probe failed for {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Transcode to {resolution}p failed (exit code {exit_code:?}): {message}")]
    TranscodeFailed {
        resolution: u32,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("Source height {height}px is below the smallest ladder resolution")]
    NoRenditions { height: u32 },

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Capacity(#[from] salingtau_infra::CapacityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Whether running the same job again can succeed without a new upload.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::MissingInput { .. }
            | PipelineError::Validation(_)
            | PipelineError::MalformedPath(_)
            | PipelineError::ProbeFailed { .. }
            | PipelineError::TranscodeFailed { .. }
            | PipelineError::NoRenditions { .. }
            | PipelineError::Encode(_)
            | PipelineError::UnknownJobKind(_) => false,
            PipelineError::Storage(StorageError::InvalidKey(_)) => false,
            // A panic in blocking work repeats on every attempt
            PipelineError::Join(e) if e.is_panic() => false,
            PipelineError::Storage(_)
            | PipelineError::Repository(_)
            | PipelineError::Io(_)
            | PipelineError::Join(_)
            | PipelineError::Capacity(_) => true,
        }
    }

    pub fn into_task_error(self) -> TaskError {
        if self.is_recoverable() {
            TaskError::recoverable(self)
        } else {
            TaskError::unrecoverable(self)
        }
    }
}

impl From<PipelineError> for TaskError {
    fn from(err: PipelineError) -> Self {
        err.into_task_error()
    }
}
