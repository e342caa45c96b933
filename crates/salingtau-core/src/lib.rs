//! Salingtau core library
//!
//! Shared types for the media pipeline crates: configuration, the staged file
//! path scheme, domain models touched by the pipeline, job payloads and the
//! task error used to tell the worker whether a failure is worth retrying.

pub mod config;
pub mod constants;
pub mod job;
pub mod models;
pub mod paths;
pub mod storage_types;
pub mod task_error;

pub use config::{Config, DiskCheckBehavior, LogFormat};
pub use job::{Job, JobKind, JobPayload};
pub use models::{Course, ImageMetadata, LectureVideo, LectureVideoStatus, User, UserUpdate};
pub use paths::{
    CourseThumbnailPath, LectureVideoTemporaryPath, MalformedPathError, ProfilePicturePath,
    Resolution, StagedFilePath,
};
pub use storage_types::StorageBackend;
pub use task_error::TaskError;
