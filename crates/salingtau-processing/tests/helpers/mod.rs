//! Test helpers: consumers wired to in-process storage, map-backed
//! repositories and a scripted toolchain.
//!
//! Run from workspace root: `cargo test -p salingtau-processing`.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use salingtau_db::{InMemoryCourseRepository, InMemoryLectureVideoRepository, InMemoryUserRepository};
use salingtau_infra::{CapacityChecker, CapacityError, DiskSpaceProbe};
use salingtau_processing::{
    ImageJobConsumer, ImageSettings, MediaToolchain, PipelineError, PipelineResult,
    VideoJobConsumer, VideoSettings,
};
use salingtau_storage::MemoryStorage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Fastest encoder settings; output quality is irrelevant here.
pub const TEST_IMAGE_SETTINGS: ImageSettings = ImageSettings {
    quality: 50,
    speed: 10,
};

pub fn create_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([220, 80, 40, 255]));
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    DynamicImage::ImageRgba8(img)
        .to_rgb8()
        .write_to(&mut cursor, format)
        .unwrap();
    buffer
}

pub fn create_png(width: u32, height: u32) -> Vec<u8> {
    create_image(width, height, ImageFormat::Png)
}

pub struct ImageHarness {
    pub storage: MemoryStorage,
    pub users: InMemoryUserRepository,
    pub courses: InMemoryCourseRepository,
    pub consumer: ImageJobConsumer,
}

pub fn image_harness() -> ImageHarness {
    let storage = MemoryStorage::new();
    let users = InMemoryUserRepository::new();
    let courses = InMemoryCourseRepository::new();

    let consumer = ImageJobConsumer::new(
        Arc::new(storage.clone()),
        Arc::new(users.clone()),
        Arc::new(courses.clone()),
        TEST_IMAGE_SETTINGS,
    );

    ImageHarness {
        storage,
        users,
        courses,
        consumer,
    }
}

/// Stands in for ffprobe/ffmpeg. `segment` writes a playlist and two
/// segments, the way ffmpeg lays out an HLS rendition.
pub struct FakeToolchain {
    height: u32,
    duration_seconds: f64,
    fail_at: Option<u32>,
    skip_playlist_at: Option<u32>,
    segmented: Mutex<Vec<u32>>,
    inputs: Mutex<Vec<PathBuf>>,
    probed_bytes: Mutex<Option<Vec<u8>>>,
}

impl FakeToolchain {
    pub fn new(height: u32, duration_seconds: f64) -> Self {
        Self {
            height,
            duration_seconds,
            fail_at: None,
            skip_playlist_at: None,
            segmented: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            probed_bytes: Mutex::new(None),
        }
    }

    /// Exit non-zero when asked for `resolution`.
    pub fn failing_at(mut self, resolution: u32) -> Self {
        self.fail_at = Some(resolution);
        self
    }

    /// Exit zero at `resolution` without writing a playlist.
    pub fn without_playlist_at(mut self, resolution: u32) -> Self {
        self.skip_playlist_at = Some(resolution);
        self
    }

    /// Resolutions `segment` was called with, in call order.
    pub fn segmented(&self) -> Vec<u32> {
        self.segmented.lock().unwrap().clone()
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        self.inputs.lock().unwrap().clone()
    }

    /// Content of the local source at the time it was first probed.
    pub fn probed_bytes(&self) -> Option<Vec<u8>> {
        self.probed_bytes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaToolchain for FakeToolchain {
    async fn probe_height(&self, input: &Path) -> PipelineResult<u32> {
        let bytes = tokio::fs::read(input).await?;
        *self.probed_bytes.lock().unwrap() = Some(bytes);
        self.inputs.lock().unwrap().push(input.to_path_buf());
        Ok(self.height)
    }

    async fn probe_duration_seconds(&self, _input: &Path) -> PipelineResult<f64> {
        Ok(self.duration_seconds)
    }

    async fn segment(
        &self,
        input: &Path,
        output_dir: &Path,
        resolution: u32,
        _segment_seconds: u32,
    ) -> PipelineResult<()> {
        assert!(input.exists(), "source must be on disk while segmenting");
        self.segmented.lock().unwrap().push(resolution);

        if self.fail_at == Some(resolution) {
            return Err(PipelineError::TranscodeFailed {
                resolution,
                exit_code: Some(1),
                message: "Conversion failed!".to_string(),
            });
        }

        tokio::fs::write(output_dir.join("segment-000.ts"), format!("ts-{}-0", resolution)).await?;
        tokio::fs::write(output_dir.join("segment-001.ts"), format!("ts-{}-1", resolution)).await?;
        if self.skip_playlist_at != Some(resolution) {
            tokio::fs::write(
                output_dir.join("index.m3u8"),
                "#EXTM3U\n#EXTINF:6.0,\nsegment-000.ts\n#EXTINF:6.0,\nsegment-001.ts\n#EXT-X-ENDLIST\n",
            )
            .await?;
        }
        Ok(())
    }
}

/// Reports a fixed amount of free space.
pub struct FixedDiskSpace(pub u64);

impl DiskSpaceProbe for FixedDiskSpace {
    fn available_bytes(&self, _path: &Path) -> Result<u64, CapacityError> {
        Ok(self.0)
    }
}

pub struct VideoHarness {
    pub storage: MemoryStorage,
    pub videos: InMemoryLectureVideoRepository,
    pub toolchain: Arc<FakeToolchain>,
    pub consumer: VideoJobConsumer,
    pub work_root: TempDir,
}

impl VideoHarness {
    pub fn with_capacity_checker(mut self, checker: CapacityChecker) -> Self {
        self.consumer = self.consumer.with_capacity_checker(checker);
        self
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_root.path().join("videos")
    }

    /// Per-job directories left behind under the work dir.
    pub fn leftover_work_dirs(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_dir())
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

pub fn video_harness(toolchain: FakeToolchain) -> VideoHarness {
    let storage = MemoryStorage::new();
    let videos = InMemoryLectureVideoRepository::new();
    let toolchain = Arc::new(toolchain);
    let work_root = tempfile::tempdir().unwrap();

    let consumer = VideoJobConsumer::new(
        Arc::new(storage.clone()),
        Arc::new(videos.clone()),
        toolchain.clone(),
        VideoSettings {
            // A subdirectory that does not exist yet; the consumer creates it
            work_dir: work_root.path().join("videos"),
            segment_seconds: 6,
        },
    );

    VideoHarness {
        storage,
        videos,
        toolchain,
        consumer,
        work_root,
    }
}
