//! salingtau-worker: run media pipeline jobs from the command line.
//!
//! Configuration comes from the environment (and `.env`), see `Config`.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use salingtau_core::{Config, Job};
use salingtau_infra::init_telemetry;
use salingtau_processing::FfmpegToolchain;
use salingtau_worker::{JobHandlerContext, JobQueue, JobQueueConfig, PipelineContext};

#[derive(Parser)]
#[command(name = "salingtau-worker", about = "Salingtau media pipeline worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one job, retrying recoverable failures
    Process {
        /// Job name: profile-picture, video-thumbnail or lecture-video
        #[arg(long)]
        kind: String,
        /// Staged file path carried by the job
        #[arg(long)]
        path: String,
    },
    /// Check that ffmpeg and ffprobe can be executed
    CheckToolchain,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    init_telemetry(config.log_format())
        .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;

    match cli.command {
        Commands::CheckToolchain => {
            let versions = FfmpegToolchain::from_config(&config)
                .check()
                .await
                .context("Transcoding toolchain is not usable")?;
            for version in versions {
                println!("{}", version);
            }
        }
        Commands::Process { kind, path } => {
            let context: Arc<dyn JobHandlerContext> =
                Arc::new(PipelineContext::from_config(&config).await?);
            let queue = JobQueue::new(
                JobQueueConfig::from_config(&config),
                Arc::downgrade(&context),
            );

            let report = queue.submit(Job::named(kind, path)).await?.wait().await?;
            queue.shutdown().await;

            let value = report.result.with_context(|| {
                format!(
                    "Job {} failed after {} attempt(s)",
                    report.job_id, report.attempts
                )
            })?;
            println!("{}", value);
        }
    }

    Ok(())
}
