//! Persistence for the records the media pipeline updates.
//!
//! The consumers only see the repository traits in [`repository`]. PostgreSQL
//! implementations live in [`postgres`]; [`memory`] holds map-backed versions
//! for tests and database-less runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{RepositoryError, RepositoryResult};
pub use memory::{InMemoryCourseRepository, InMemoryLectureVideoRepository, InMemoryUserRepository};
pub use postgres::{
    connect, PgCourseRepository, PgLectureVideoRepository, PgUserRepository,
};
pub use repository::{CourseRepository, LectureVideoRepository, UserRepository};
