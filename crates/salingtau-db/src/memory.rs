//! Map-backed repositories

use async_trait::async_trait;
use salingtau_core::{Course, LectureVideo, User, UserUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::{CourseRepository, LectureVideoRepository, UserRepository};
use crate::RepositoryResult;

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.get(id).await)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> RepositoryResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(profile_pictures) = update.profile_pictures {
            user.profile_pictures = profile_pictures;
        }
        Ok(Some(user.clone()))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCourseRepository {
    courses: Arc<RwLock<HashMap<Uuid, Course>>>,
}

impl InMemoryCourseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, course: Course) {
        self.courses.write().await.insert(course.id, course);
    }

    pub async fn get(&self, id: Uuid) -> Option<Course> {
        self.courses.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl CourseRepository for InMemoryCourseRepository {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Course>> {
        Ok(self.get(id).await)
    }

    async fn save(&self, course: &Course) -> RepositoryResult<()> {
        self.courses.write().await.insert(course.id, course.clone());
        Ok(())
    }
}

/// Keeps every saved version so tests can inspect status transitions.
#[derive(Clone, Default)]
pub struct InMemoryLectureVideoRepository {
    videos: Arc<RwLock<HashMap<Uuid, LectureVideo>>>,
    history: Arc<RwLock<Vec<LectureVideo>>>,
}

impl InMemoryLectureVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, video: LectureVideo) {
        self.videos.write().await.insert(video.id, video);
    }

    pub async fn get_by_lecture_id(&self, lecture_id: Uuid) -> Option<LectureVideo> {
        self.videos
            .read()
            .await
            .values()
            .find(|v| v.lecture_id == lecture_id)
            .cloned()
    }

    /// Versions passed to `save`, oldest first.
    pub async fn history(&self) -> Vec<LectureVideo> {
        self.history.read().await.clone()
    }
}

#[async_trait]
impl LectureVideoRepository for InMemoryLectureVideoRepository {
    async fn find_by_lecture_id(&self, lecture_id: Uuid) -> RepositoryResult<Option<LectureVideo>> {
        Ok(self.get_by_lecture_id(lecture_id).await)
    }

    async fn save(&self, video: &LectureVideo) -> RepositoryResult<()> {
        self.videos.write().await.insert(video.id, video.clone());
        self.history.write().await.push(video.clone());
        Ok(())
    }
}
