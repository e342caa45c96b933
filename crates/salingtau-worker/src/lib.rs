//! Salingtau worker
//!
//! Runs pipeline jobs with bounded concurrency and retries recoverable
//! failures with exponential backoff. [`PipelineContext`] routes each job by
//! name to the image or video consumer.

pub mod context;
pub mod dispatch;
pub mod queue;

pub use context::JobHandlerContext;
pub use dispatch::PipelineContext;
pub use queue::{
    compute_retry_backoff_seconds, JobHandle, JobQueue, JobQueueConfig, JobReport,
    MAX_RETRY_BACKOFF_SECS,
};
