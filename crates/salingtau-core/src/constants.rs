//! Pipeline constants shared between the consumers and the worker

/// Queue carrying profile picture and course thumbnail jobs
pub const IMAGE_PROCESSING_QUEUE: &str = "image-processing";

/// Queue carrying lecture video jobs
pub const VIDEO_PROCESSING_QUEUE: &str = "video-processing";

/// Square rendition sizes produced for every processed image, ascending.
pub const IMAGE_RENDITION_SIZES: [u32; 3] = [128, 512, 1024];

/// Image types accepted after content sniffing.
pub const ALLOWED_IMAGE_CONTENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "image/gif"];

pub const AVIF_CONTENT_TYPE: &str = "image/avif";
pub const AVIF_EXTENSION: &str = "avif";

/// Encoder quality accepted by ravif; anything outside panics in the encoder
pub const AVIF_QUALITY_RANGE: std::ops::RangeInclusive<u8> = 1..=100;
pub const AVIF_SPEED_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

pub const HLS_PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const HLS_SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Name of the playlist ffmpeg writes into each per-resolution directory
pub const VARIANT_PLAYLIST_NAME: &str = "index.m3u8";

/// Name of the top-level playlist uploaded per course
pub const MASTER_PLAYLIST_NAME: &str = "master.m3u8";
