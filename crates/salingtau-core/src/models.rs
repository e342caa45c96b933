//! Records the pipeline reads and writes
//!
//! Only the fields the consumers touch are modelled; the rest of each entity
//! belongs to the CRUD surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored image rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Square renditions plus the canonical original, replaced wholesale on
    /// every successful run.
    pub profile_pictures: Vec<ImageMetadata>,
}

/// Partial update applied through `UserRepository::update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub profile_pictures: Option<Vec<ImageMetadata>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub thumbnail: Option<ImageMetadata>,
}

/// Processing state of a lecture video.
///
/// `Processing` is set when a worker picks the job up. There is no failed
/// state: a failed job leaves the record short of `Ready` and the error goes
/// to the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "lecture_video_status", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LectureVideoStatus {
    #[default]
    Empty,
    Processing,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LectureVideo {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub status: LectureVideoStatus,
    pub duration_milliseconds: Option<u64>,
    /// Ladder heights available for playback, ascending
    pub resolutions: Vec<u32>,
}

impl LectureVideo {
    pub fn new(lecture_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            lecture_id,
            status: LectureVideoStatus::Empty,
            duration_milliseconds: None,
            resolutions: Vec::new(),
        }
    }
}
