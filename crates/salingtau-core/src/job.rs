//! Job payloads exchanged with the queue
//!
//! The body only carries the staged path; the kind travels as the queue's job
//! name, the way the uploader enqueues it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::{IMAGE_PROCESSING_QUEUE, VIDEO_PROCESSING_QUEUE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub path: String,
}

/// Known job names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ProfilePicture,
    VideoThumbnail,
    LectureVideo,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ProfilePicture => "profile-picture",
            JobKind::VideoThumbnail => "video-thumbnail",
            JobKind::LectureVideo => "lecture-video",
        }
    }

    /// Queue the kind is published on
    pub fn queue(&self) -> &'static str {
        match self {
            JobKind::ProfilePicture | JobKind::VideoThumbnail => IMAGE_PROCESSING_QUEUE,
            JobKind::LectureVideo => VIDEO_PROCESSING_QUEUE,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile-picture" => Ok(JobKind::ProfilePicture),
            "video-thumbnail" => Ok(JobKind::VideoThumbnail),
            "lecture-video" => Ok(JobKind::LectureVideo),
            _ => Err(anyhow::anyhow!("Unknown job kind: {}", s)),
        }
    }
}

/// A delivered job. `name` is kept as the raw string so unknown kinds reach
/// the dispatcher and fail there with job identity in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub payload: JobPayload,
}

impl Job {
    pub fn new(kind: JobKind, path: impl Into<String>) -> Self {
        Self::named(kind.as_str(), path)
    }

    pub fn named(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload: JobPayload { path: path.into() },
        }
    }

    pub fn kind(&self) -> anyhow::Result<JobKind> {
        self.name.parse()
    }
}
