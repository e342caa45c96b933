//! Lecture video processing: HLS ladder generation and publishing

mod consumer;
pub mod ladder;
pub mod manifest;
pub mod toolchain;

pub use consumer::{master_playlist_key, rendition_key, VideoJobConsumer, VideoSettings};
pub use ladder::{
    build_ladder, duration_millis, estimate_bandwidth, width_for_height, CANDIDATE_RESOLUTIONS,
};
pub use manifest::{build_master_playlist, segment_content_type, MasterPlaylistEntry};
pub use toolchain::{FfmpegToolchain, MediaToolchain};
