//! Routes jobs to the pipeline consumers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use salingtau_core::{Config, Job, JobKind, TaskError};
use salingtau_db::{
    CourseRepository, InMemoryCourseRepository, InMemoryLectureVideoRepository,
    InMemoryUserRepository, LectureVideoRepository, PgCourseRepository, PgLectureVideoRepository,
    PgUserRepository, UserRepository,
};
use salingtau_infra::CapacityChecker;
use salingtau_processing::{
    FfmpegToolchain, ImageJobConsumer, ImageSettings, JobOutcome, PipelineError, PipelineResult,
    VideoJobConsumer, VideoSettings,
};
use salingtau_storage::create_storage;

use crate::context::JobHandlerContext;

pub struct PipelineContext {
    image: ImageJobConsumer,
    video: VideoJobConsumer,
}

impl PipelineContext {
    pub fn new(image: ImageJobConsumer, video: VideoJobConsumer) -> Self {
        Self { image, video }
    }

    /// Wire storage, repositories and the ffmpeg toolchain from configuration.
    ///
    /// Without `DATABASE_URL` the repositories are in-memory and start empty,
    /// so every job ends as `OwnerMissing`. Useful for exercising storage and
    /// ffmpeg in isolation.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let storage = create_storage(config)
            .await
            .context("Failed to initialize storage")?;

        let (users, courses, lecture_videos): (
            Arc<dyn UserRepository>,
            Arc<dyn CourseRepository>,
            Arc<dyn LectureVideoRepository>,
        ) = match salingtau_db::connect(config).await? {
            Some(pool) => (
                Arc::new(PgUserRepository::new(pool.clone())),
                Arc::new(PgCourseRepository::new(pool.clone())),
                Arc::new(PgLectureVideoRepository::new(pool)),
            ),
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory repositories");
                (
                    Arc::new(InMemoryUserRepository::new()),
                    Arc::new(InMemoryCourseRepository::new()),
                    Arc::new(InMemoryLectureVideoRepository::new()),
                )
            }
        };

        let image = ImageJobConsumer::new(
            storage.clone(),
            users,
            courses,
            ImageSettings::from_config(config),
        );
        let video = VideoJobConsumer::new(
            storage,
            lecture_videos,
            Arc::new(FfmpegToolchain::from_config(config)),
            VideoSettings::from_config(config),
        )
        .with_capacity_checker(CapacityChecker::new(config));

        Ok(Self::new(image, video))
    }

    /// Run one job to its pipeline outcome.
    pub async fn run(&self, job: &Job) -> PipelineResult<JobOutcome> {
        let path = job.payload.path.as_str();
        let kind = job
            .kind()
            .map_err(|_| PipelineError::UnknownJobKind(job.name.clone()))?;

        match kind {
            JobKind::ProfilePicture => self.image.process_profile_picture(path).await,
            JobKind::VideoThumbnail => self.image.process_course_thumbnail(path).await,
            JobKind::LectureVideo => self.video.process_lecture_video(path).await,
        }
    }
}

#[async_trait]
impl JobHandlerContext for PipelineContext {
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value> {
        tracing::debug!(job_id = %job.id, job_name = %job.name, path = %job.payload.path, "Dispatching job");

        let outcome = self
            .run(job)
            .await
            .map_err(|e| anyhow::Error::from(TaskError::from(e)))?;

        Ok(serde_json::to_value(outcome)?)
    }
}
