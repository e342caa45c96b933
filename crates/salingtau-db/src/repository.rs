//! Repository contracts used by the consumers.
//!
//! Plain get/update/save by id. No transaction spans more than one call, so a
//! pipeline step that fails after an update leaves that update in place.

use async_trait::async_trait;
use salingtau_core::{Course, LectureVideo, User, UserUpdate};
use uuid::Uuid;

use crate::RepositoryResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;

    /// Apply the set fields of `update`. Returns the updated user, or `None`
    /// if no user has this id.
    async fn update(&self, id: Uuid, update: UserUpdate) -> RepositoryResult<Option<User>>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Course>>;

    async fn save(&self, course: &Course) -> RepositoryResult<()>;
}

#[async_trait]
pub trait LectureVideoRepository: Send + Sync {
    async fn find_by_lecture_id(&self, lecture_id: Uuid) -> RepositoryResult<Option<LectureVideo>>;

    async fn save(&self, video: &LectureVideo) -> RepositoryResult<()>;
}
