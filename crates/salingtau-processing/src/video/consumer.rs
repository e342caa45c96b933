//! Lecture video job consumer
//!
//! Staged upload → local copy → probe → HLS ladder (one resolution at a time)
//! → master playlist → lecture video record. All local files live in a
//! per-job temporary directory that is removed whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use salingtau_core::constants::{
    HLS_PLAYLIST_CONTENT_TYPE, MASTER_PLAYLIST_NAME, VARIANT_PLAYLIST_NAME,
};
use salingtau_core::{Config, LectureVideoStatus, LectureVideoTemporaryPath, StagedFilePath};
use salingtau_db::LectureVideoRepository;
use salingtau_infra::CapacityChecker;
use salingtau_storage::{ByteStream, FileStorage, UploadOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::ladder::{build_ladder, duration_millis};
use super::manifest::{build_master_playlist, segment_content_type, MasterPlaylistEntry};
use super::toolchain::MediaToolchain;
use crate::error::{JobOutcome, PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    /// Parent of the per-job temporary directories
    pub work_dir: PathBuf,
    pub segment_seconds: u32,
}

impl VideoSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            work_dir: config.video_work_dir().to_path_buf(),
            segment_seconds: config.hls_segment_duration(),
        }
    }
}

/// Remote key of a file produced for one resolution.
pub fn rendition_key(course_id: Uuid, resolution: u32, file_name: &str) -> String {
    format!("courses/{}/{}p/{}", course_id, resolution, file_name)
}

/// Remote key of the master playlist. Shared by every lecture of a course.
pub fn master_playlist_key(course_id: Uuid) -> String {
    format!("courses/{}/{}", course_id, MASTER_PLAYLIST_NAME)
}

pub struct VideoJobConsumer {
    storage: Arc<dyn FileStorage>,
    lecture_videos: Arc<dyn LectureVideoRepository>,
    toolchain: Arc<dyn MediaToolchain>,
    capacity: Option<CapacityChecker>,
    settings: VideoSettings,
}

impl VideoJobConsumer {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        lecture_videos: Arc<dyn LectureVideoRepository>,
        toolchain: Arc<dyn MediaToolchain>,
        settings: VideoSettings,
    ) -> Self {
        Self {
            storage,
            lecture_videos,
            toolchain,
            capacity: None,
            settings,
        }
    }

    /// Refuse (or warn about) jobs whose source would not fit on local disk.
    pub fn with_capacity_checker(mut self, checker: CapacityChecker) -> Self {
        self.capacity = Some(checker);
        self
    }

    #[tracing::instrument(skip(self), fields(job.kind = "lecture-video"))]
    pub async fn process_lecture_video(&self, path: &str) -> PipelineResult<JobOutcome> {
        let staged = LectureVideoTemporaryPath::parse(path)?;
        let key = staged.to_string();

        let (properties, stream) = tokio::try_join!(
            self.storage.get_file_properties(&key),
            self.storage.get_file(&key)
        )?;
        let (Some(properties), Some(stream)) = (properties, stream) else {
            return Err(PipelineError::MissingInput { path: key });
        };

        tokio::fs::create_dir_all(&self.settings.work_dir).await?;
        let work = tempfile::Builder::new()
            .prefix(&format!("{}-", staged.lecture_id()))
            .tempdir_in(&self.settings.work_dir)?;

        tracing::info!(
            lecture_id = %staged.lecture_id(),
            course_id = %staged.course_id(),
            size_bytes = properties.size,
            work_dir = %work.path().display(),
            "Starting lecture video processing"
        );

        let result = self
            .transcode_and_publish(&staged, properties.size, stream, work.path())
            .await;

        let work_path = work.path().to_path_buf();
        if let Err(e) = work.close() {
            tracing::warn!(
                path = %work_path.display(),
                error = %e,
                "Failed to remove video work directory"
            );
        }

        if let Err(e) = &result {
            tracing::error!(
                lecture_id = %staged.lecture_id(),
                error = %e,
                "Lecture video processing failed"
            );
        }
        result
    }

    async fn transcode_and_publish(
        &self,
        staged: &LectureVideoTemporaryPath,
        source_size: u64,
        stream: ByteStream,
        work: &Path,
    ) -> PipelineResult<JobOutcome> {
        let lecture_id = staged.lecture_id();
        let course_id = staged.course_id();

        if let Some(checker) = &self.capacity {
            let required = checker.estimate_video_transcode_space(source_size);
            let checker = checker.clone();
            let dir = work.to_path_buf();
            tokio::task::spawn_blocking(move || checker.check_disk_space(&dir, required))
                .await??;
        }

        if let Some(mut video) = self.lecture_videos.find_by_lecture_id(lecture_id).await? {
            video.status = LectureVideoStatus::Processing;
            self.lecture_videos.save(&video).await?;
        }

        let source = work.join(format!("{}.bin", lecture_id));
        let copied = materialize(stream, &source).await?;
        tracing::debug!(path = %source.display(), bytes = copied, "Source copied to local disk");

        let height = self.toolchain.probe_height(&source).await?;
        let duration_ms = duration_millis(self.toolchain.probe_duration_seconds(&source).await?);

        let ladder = build_ladder(height);
        if ladder.is_empty() {
            return Err(PipelineError::NoRenditions { height });
        }
        tracing::info!(
            lecture_id = %lecture_id,
            height = height,
            duration_ms = duration_ms,
            ladder = ?ladder,
            "Transcoding ladder"
        );

        // One resolution at a time keeps local disk to a single rendition
        for &resolution in &ladder {
            let output_dir = work.join(format!("{}p", resolution));
            tokio::fs::create_dir_all(&output_dir).await?;

            self.toolchain
                .segment(&source, &output_dir, resolution, self.settings.segment_seconds)
                .await?;
            let uploaded = self
                .publish_rendition(course_id, resolution, &output_dir)
                .await?;
            tokio::fs::remove_dir_all(&output_dir).await?;

            tracing::info!(
                lecture_id = %lecture_id,
                resolution = resolution,
                files = uploaded,
                "Rendition published"
            );
        }

        let entries: Vec<_> = ladder
            .iter()
            .copied()
            .map(MasterPlaylistEntry::for_resolution)
            .collect();
        self.storage
            .upload_bytes(
                &master_playlist_key(course_id),
                build_master_playlist(&entries).into_bytes(),
                UploadOptions::with_content_type(HLS_PLAYLIST_CONTENT_TYPE),
            )
            .await?;

        tokio::fs::remove_file(&source).await?;

        let Some(mut video) = self.lecture_videos.find_by_lecture_id(lecture_id).await? else {
            tracing::warn!(
                lecture_id = %lecture_id,
                "Lecture video record not found, rendition ladder not attached"
            );
            return Ok(JobOutcome::OwnerMissing {
                owner_id: lecture_id,
            });
        };

        video.status = LectureVideoStatus::Ready;
        video.duration_milliseconds = Some(duration_ms);
        video.resolutions = ladder;
        self.lecture_videos.save(&video).await?;

        let staged_key = staged.to_string();
        if let Err(e) = self.storage.delete_file(&staged_key).await {
            tracing::warn!(path = %staged_key, error = %e, "Failed to remove staged video");
        }

        tracing::info!(lecture_id = %lecture_id, "Lecture video ready");
        Ok(JobOutcome::Completed)
    }

    /// Upload everything the segmenter wrote for `resolution`, playlist
    /// included. Returns the number of files uploaded.
    async fn publish_rendition(
        &self,
        course_id: Uuid,
        resolution: u32,
        output_dir: &Path,
    ) -> PipelineResult<usize> {
        if !tokio::fs::try_exists(output_dir.join(VARIANT_PLAYLIST_NAME)).await? {
            return Err(PipelineError::TranscodeFailed {
                resolution,
                exit_code: Some(0),
                message: format!("no {} was written", VARIANT_PLAYLIST_NAME),
            });
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();

        for name in &files {
            let file = tokio::fs::File::open(output_dir.join(name)).await?;
            self.storage
                .upload_file(
                    &rendition_key(course_id, resolution, name),
                    Box::pin(file),
                    UploadOptions::with_content_type(segment_content_type(name)),
                )
                .await?;
        }

        Ok(files.len())
    }
}

/// Copy the whole remote stream to `destination` and flush it to disk.
/// Probing only starts once this returns.
async fn materialize(mut stream: ByteStream, destination: &Path) -> PipelineResult<u64> {
    let mut file = tokio::fs::File::create(destination).await?;
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn remote_keys() {
        let course_id = Uuid::nil();
        assert_eq!(
            rendition_key(course_id, 720, "segment-000.ts"),
            "courses/00000000-0000-0000-0000-000000000000/720p/segment-000.ts"
        );
        assert_eq!(
            master_playlist_key(course_id),
            "courses/00000000-0000-0000-0000-000000000000/master.m3u8"
        );
    }

    #[tokio::test]
    async fn materialize_writes_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("source.bin");
        let chunks: Vec<Result<Bytes, salingtau_storage::StorageError>> =
            vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));

        let written = materialize(stream, &destination).await.unwrap();

        assert_eq!(written, 6);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn materialize_aborts_on_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("source.bin");
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(salingtau_storage::StorageError::DownloadFailed(
                "connection reset".to_string(),
            )),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));

        let err = materialize(stream, &destination).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
    }
}
