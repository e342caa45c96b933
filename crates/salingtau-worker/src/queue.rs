//! Job queue: bounded worker pool, retry with backoff, and submission.
//!
//! Delivery is at-least-once from the queue's point of view: a job that fails
//! with a recoverable error is run again from scratch after a backoff. Jobs
//! failing with an unrecoverable [`TaskError`](salingtau_core::TaskError) are
//! reported immediately.
//!
//! Shutdown: [`JobQueue::shutdown`] stops the pool from starting new jobs; it
//! does not wait for in-flight jobs.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use salingtau_core::task_error::is_unrecoverable;
use salingtau_core::{Config, Job};

use crate::context::JobHandlerContext;

/// Maximum delay in seconds before retrying a failed job. Caps exponential
/// backoff so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds after `failed_attempts` failures (exponential
/// with cap).
#[inline]
pub fn compute_retry_backoff_seconds(failed_attempts: u32) -> u64 {
    2_u64
        .saturating_pow(failed_attempts)
        .min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Jobs running at the same time
    pub max_jobs: usize,
    /// Retries after the first attempt for recoverable failures
    pub max_retries: u32,
    /// Length of one backoff "second"; shortened in tests.
    pub backoff_unit: Duration,
}

impl JobQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_jobs: config.worker_max_jobs(),
            max_retries: config.worker_max_retries(),
            ..Self::default()
        }
    }
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_jobs: 2,
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Final result of a submitted job.
#[derive(Debug)]
pub struct JobReport {
    pub job_id: Uuid,
    /// Times the handler ran, including the first
    pub attempts: u32,
    pub result: Result<serde_json::Value>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Resolves once the job has succeeded or given up.
pub struct JobHandle {
    job_id: Uuid,
    report_rx: oneshot::Receiver<JobReport>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub async fn wait(self) -> Result<JobReport> {
        self.report_rx
            .await
            .map_err(|_| anyhow!("Job {} was dropped before it finished", self.job_id))
    }
}

struct QueuedJob {
    job: Job,
    report_tx: oneshot::Sender<JobReport>,
}

pub struct JobQueue {
    config: JobQueueConfig,
    job_tx: mpsc::Sender<QueuedJob>,
    shutdown_tx: mpsc::Sender<()>,
    closed: Arc<AtomicBool>,
}

impl JobQueue {
    /// Create a queue and spawn its worker pool. Must be called inside a
    /// Tokio runtime.
    pub fn new(config: JobQueueConfig, context: Weak<dyn JobHandlerContext>) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.max_jobs.max(1) * 16);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(Self::worker_pool(
            config.clone(),
            context,
            job_rx,
            shutdown_rx,
        ));

        Self {
            config,
            job_tx,
            shutdown_tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// Submit a job. Fails once the queue has been shut down.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, job_name = %job.name))]
    pub async fn submit(&self, job: Job) -> Result<JobHandle> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(anyhow!("Job queue is shut down"));
        }

        let job_id = job.id;
        let (report_tx, report_rx) = oneshot::channel();
        self.job_tx
            .send(QueuedJob { job, report_tx })
            .await
            .map_err(|_| anyhow!("Job queue is shut down"))?;

        tracing::info!("Job submitted to queue");
        Ok(JobHandle { job_id, report_rx })
    }

    async fn worker_pool(
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        mut job_rx: mpsc::Receiver<QueuedJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            max_jobs = config.max_jobs,
            max_retries = config.max_retries,
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_jobs.max(1)));

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                queued = job_rx.recv() => {
                    let Some(queued) = queued else { break };

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let ctx = context.clone();
                    let config = config.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let report = Self::process_job_with_retry(queued.job, ctx, &config).await;
                        // The submitter may have stopped waiting
                        let _ = queued.report_tx.send(report);
                    });
                }
            }
        }

        tracing::info!("Job queue worker pool stopped");
    }

    async fn process_job_with_retry(
        job: Job,
        context: Weak<dyn JobHandlerContext>,
        config: &JobQueueConfig,
    ) -> JobReport {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let Some(ctx) = context.upgrade() else {
                tracing::error!(job_id = %job.id, "Job handler context dropped");
                return JobReport {
                    job_id: job.id,
                    attempts,
                    result: Err(anyhow!("Job handler context is no longer available")),
                };
            };

            tracing::info!(job_id = %job.id, job_name = %job.name, attempt = attempts, "Processing job");

            match ctx.dispatch_job(&job).await {
                Ok(value) => {
                    tracing::info!(job_id = %job.id, attempts = attempts, "Job completed");
                    return JobReport {
                        job_id: job.id,
                        attempts,
                        result: Ok(value),
                    };
                }
                Err(e) if is_unrecoverable(&e) => {
                    tracing::error!(
                        job_id = %job.id,
                        error = %e,
                        "Job failed with unrecoverable error, not retrying"
                    );
                    return JobReport {
                        job_id: job.id,
                        attempts,
                        result: Err(e),
                    };
                }
                Err(e) if attempts > config.max_retries => {
                    tracing::error!(
                        job_id = %job.id,
                        error = %e,
                        attempts = attempts,
                        "Job failed after max retries"
                    );
                    return JobReport {
                        job_id: job.id,
                        attempts,
                        result: Err(e),
                    };
                }
                Err(e) => {
                    let backoff_seconds = compute_retry_backoff_seconds(attempts);
                    tracing::warn!(
                        job_id = %job.id,
                        error = %e,
                        retry_count = attempts,
                        backoff_seconds = backoff_seconds,
                        "Scheduling job retry"
                    );
                    sleep(config.backoff_unit * backoff_seconds as u32).await;
                }
            }
        }
    }

    /// Signals the worker pool to stop starting new jobs.
    ///
    /// Returns immediately; jobs already running continue until they finish.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(64), MAX_RETRY_BACKOFF_SECS);
    }

    #[test]
    fn queue_config_from_environment() {
        let env = [("WORKER_MAX_JOBS", "5"), ("WORKER_MAX_RETRIES", "1")];
        let config = salingtau_core::config::PipelineConfig::from_lookup(|key| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();

        let queue_config = JobQueueConfig::from_config(&Config(Box::new(config)));
        assert_eq!(queue_config.max_jobs, 5);
        assert_eq!(queue_config.max_retries, 1);
        assert_eq!(queue_config.backoff_unit, Duration::from_secs(1));
    }
}
