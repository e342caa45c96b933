//! Salingtau media processing
//!
//! The two job consumers of the pipeline:
//!
//! - [`ImageJobConsumer`] turns a staged profile picture or course thumbnail
//!   into square AVIF renditions plus a canonical copy of the original, then
//!   rewrites the owner's rendition metadata.
//! - [`VideoJobConsumer`] copies a staged lecture video to local disk, probes
//!   it, transcodes an HLS ladder one resolution at a time, publishes segments
//!   and a master playlist, and marks the lecture video ready.
//!
//! Both are safe to run again from scratch on redelivery: every output key is
//! derived from the staged path, so a rerun overwrites the same objects.

pub mod error;
#[cfg(feature = "image")]
pub mod image;
#[cfg(feature = "video")]
pub mod video;

pub use error::{JobOutcome, PipelineError, PipelineResult};
#[cfg(feature = "image")]
pub use crate::image::{ImageJobConsumer, ImageSettings};
#[cfg(feature = "video")]
pub use crate::video::{FfmpegToolchain, MediaToolchain, VideoJobConsumer, VideoSettings};
