//! Image job consumer: staged upload → AVIF renditions + canonical original →
//! owner record.

use std::sync::Arc;

use ::image::{DynamicImage, GenericImageView};
use futures::future::try_join_all;
use salingtau_core::constants::{AVIF_CONTENT_TYPE, AVIF_EXTENSION, IMAGE_RENDITION_SIZES};
use salingtau_core::{
    Config, CourseThumbnailPath, ImageMetadata, ProfilePicturePath, Resolution, StagedFilePath,
    UserUpdate,
};
use salingtau_db::{CourseRepository, UserRepository};
use salingtau_storage::{collect_bytes, FileStorage, UploadOptions};

use super::transform::{decode, detect_image_type, encode_avif, render_square, DetectedImage};
use crate::error::{JobOutcome, PipelineError, PipelineResult};

/// AVIF encoder parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettings {
    pub quality: u8,
    pub speed: u8,
}

impl ImageSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quality: config.avif_quality(),
            speed: config.avif_speed(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            speed: 8,
        }
    }
}

/// Validated staged upload held in memory.
struct SourceImage {
    bytes: Vec<u8>,
    detected: DetectedImage,
    image: Arc<DynamicImage>,
}

impl SourceImage {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub struct ImageJobConsumer {
    storage: Arc<dyn FileStorage>,
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    settings: ImageSettings,
}

impl ImageJobConsumer {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        users: Arc<dyn UserRepository>,
        courses: Arc<dyn CourseRepository>,
        settings: ImageSettings,
    ) -> Self {
        Self {
            storage,
            users,
            courses,
            settings,
        }
    }

    /// Process a staged profile picture and replace the user's
    /// `profile_pictures` with the three renditions plus the original.
    #[tracing::instrument(skip(self), fields(job.kind = "profile-picture"))]
    pub async fn process_profile_picture(&self, path: &str) -> PipelineResult<JobOutcome> {
        let staged = ProfilePicturePath::parse(path)?;
        let user_id = staged.user_id();

        let source = self.load_source(&staged).await?;
        let mut pictures = self.publish_renditions(&staged, &source).await?;

        let Some(user) = self.users.find_by_id(user_id).await? else {
            tracing::warn!(user_id = %user_id, path = %path, "User not found, renditions not attached");
            return Ok(JobOutcome::OwnerMissing { owner_id: user_id });
        };

        let previous = find_original::<ProfilePicturePath>(&user.profile_pictures);
        let original = self.replace_original(&staged, &source).await?;
        self.remove_stale_original(previous, &original.path).await;

        pictures.push(original);
        let update = UserUpdate {
            profile_pictures: Some(pictures),
        };
        if self.users.update(user_id, update).await?.is_none() {
            tracing::warn!(user_id = %user_id, "User disappeared before update");
            return Ok(JobOutcome::OwnerMissing { owner_id: user_id });
        }

        tracing::info!(user_id = %user_id, "Profile picture processed");
        Ok(JobOutcome::Completed)
    }

    /// Process a staged course thumbnail. Renditions are published next to
    /// the staged key; only the canonical original is recorded on the course.
    #[tracing::instrument(skip(self), fields(job.kind = "video-thumbnail"))]
    pub async fn process_course_thumbnail(&self, path: &str) -> PipelineResult<JobOutcome> {
        let staged = CourseThumbnailPath::parse(path)?;
        let course_id = staged.course_id();

        let source = self.load_source(&staged).await?;
        self.publish_renditions(&staged, &source).await?;

        let Some(mut course) = self.courses.find_by_id(course_id).await? else {
            tracing::warn!(course_id = %course_id, path = %path, "Course not found, thumbnail not attached");
            return Ok(JobOutcome::OwnerMissing {
                owner_id: course_id,
            });
        };

        let previous = find_original::<CourseThumbnailPath>(course.thumbnail.as_slice());
        let original = self.replace_original(&staged, &source).await?;
        self.remove_stale_original(previous, &original.path).await;

        course.thumbnail = Some(original);
        self.courses.save(&course).await?;

        tracing::info!(course_id = %course_id, "Course thumbnail processed");
        Ok(JobOutcome::Completed)
    }

    /// Fetch, sniff and decode the staged upload.
    async fn load_source<P: StagedFilePath>(&self, staged: &P) -> PipelineResult<SourceImage> {
        let key = staged.to_string();

        let (properties, stream) = tokio::try_join!(
            self.storage.get_file_properties(&key),
            self.storage.get_file(&key)
        )?;
        let (Some(properties), Some(stream)) = (properties, stream) else {
            return Err(PipelineError::MissingInput { path: key });
        };

        let bytes = collect_bytes(stream).await?;
        let detected = detect_image_type(&bytes)?;

        tracing::debug!(
            path = %key,
            size_bytes = properties.size,
            declared_content_type = ?properties.content_type,
            detected_content_type = detected.mime,
            "Staged image fetched"
        );

        let (bytes, image) = tokio::task::spawn_blocking(move || {
            decode(&bytes, &detected).map(|image| (bytes, image))
        })
        .await??;

        Ok(SourceImage {
            bytes,
            detected,
            image: Arc::new(image),
        })
    }

    /// Render, encode and upload every rendition concurrently.
    async fn publish_renditions<P: StagedFilePath>(
        &self,
        staged: &P,
        source: &SourceImage,
    ) -> PipelineResult<Vec<ImageMetadata>> {
        let ImageSettings { quality, speed } = self.settings;

        let uploads = IMAGE_RENDITION_SIZES.iter().map(|&size| {
            let image = Arc::clone(&source.image);
            let path = staged
                .with_rendition(Resolution::Pixels(size), AVIF_EXTENSION)
                .to_string();

            async move {
                let avif = tokio::task::spawn_blocking(move || {
                    encode_avif(&render_square(&image, size), quality, speed)
                })
                .await??;

                self.storage
                    .upload_bytes(&path, avif, UploadOptions::with_content_type(AVIF_CONTENT_TYPE))
                    .await?;
                tracing::debug!(path = %path, size = size, "Rendition uploaded");

                Ok::<_, PipelineError>(ImageMetadata {
                    path,
                    width: size,
                    height: size,
                })
            }
        });

        try_join_all(uploads).await
    }

    /// Upload the untouched bytes under the canonical key for the detected
    /// type, then drop the staged input. The canonical copy always lands
    /// first, so an original exists at every point.
    async fn replace_original<P: StagedFilePath>(
        &self,
        staged: &P,
        source: &SourceImage,
    ) -> PipelineResult<ImageMetadata> {
        let staged_key = staged.to_string();
        let canonical_key = staged
            .with_rendition(Resolution::Original, source.detected.extension)
            .to_string();

        self.storage
            .upload_bytes(
                &canonical_key,
                source.bytes.clone(),
                UploadOptions::with_content_type(source.detected.mime),
            )
            .await?;

        if staged_key != canonical_key {
            self.storage.delete_file(&staged_key).await?;
        }

        let (width, height) = source.dimensions();
        Ok(ImageMetadata {
            path: canonical_key,
            width,
            height,
        })
    }

    /// Best-effort removal of an original whose key changed with the format.
    async fn remove_stale_original(&self, previous: Option<String>, current: &str) {
        let Some(previous) = previous.filter(|p| p != current) else {
            return;
        };

        match self.storage.delete_file(&previous).await {
            Ok(()) => tracing::debug!(path = %previous, "Stale original removed"),
            Err(e) => tracing::warn!(
                path = %previous,
                error = %e,
                "Failed to remove stale original"
            ),
        }
    }
}

/// Path of the entry tagged `original`. Entries that do not parse as `P` are
/// ignored.
fn find_original<P: StagedFilePath>(entries: &[ImageMetadata]) -> Option<String> {
    entries
        .iter()
        .find(|entry| {
            P::parse(&entry.path)
                .map(|path| path.resolution().is_original())
                .unwrap_or(false)
        })
        .map(|entry| entry.path.clone())
}
