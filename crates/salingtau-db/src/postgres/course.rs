use async_trait::async_trait;
use salingtau_core::{Course, ImageMetadata};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::repository::CourseRepository;
use crate::RepositoryResult;

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: Uuid,
    thumbnail: Option<Json<ImageMetadata>>,
}

/// Repository for the thumbnail column of courses
#[derive(Clone)]
pub struct PgCourseRepository {
    pool: PgPool,
}

impl PgCourseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseRepository for PgCourseRepository {
    #[tracing::instrument(skip(self), fields(db.table = "courses", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Course>> {
        let row = sqlx::query_as::<Postgres, CourseRow>(
            "SELECT id, thumbnail FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Course {
            id: row.id,
            thumbnail: row.thumbnail.map(|json| json.0),
        }))
    }

    #[tracing::instrument(skip(self, course), fields(db.table = "courses", db.operation = "upsert", db.record_id = %course.id))]
    async fn save(&self, course: &Course) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, thumbnail)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET thumbnail = EXCLUDED.thumbnail,
                updated_at = NOW()
            "#,
        )
        .bind(course.id)
        .bind(course.thumbnail.clone().map(Json))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
