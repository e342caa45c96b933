use async_trait::async_trait;
use salingtau_core::{ImageMetadata, User, UserUpdate};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::repository::UserRepository;
use crate::RepositoryResult;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    profile_pictures: Json<Vec<ImageMetadata>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            profile_pictures: row.profile_pictures.0,
        }
    }
}

/// Repository for the profile picture column of users
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<Postgres, UserRow>(
            "SELECT id, profile_pictures FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    async fn update(&self, id: Uuid, update: UserUpdate) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<Postgres, UserRow>(
            r#"
            UPDATE users
            SET profile_pictures = COALESCE($2, profile_pictures),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, profile_pictures
            "#,
        )
        .bind(id)
        .bind(update.profile_pictures.map(Json))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }
}
