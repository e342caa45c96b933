//! Job handler context trait
//!
//! The worker calls `dispatch_job` for every delivered job; the implementation
//! matches on the job name and invokes the right consumer.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use salingtau_core::Job;

/// Context for job dispatch.
///
/// The queue holds a weak reference; whoever builds the queue owns the
/// context and keeps it alive for as long as jobs should run.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    /// Run the job and return a JSON summary of its result.
    ///
    /// Errors wrapping an unrecoverable `TaskError` are not retried.
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value>;
}
