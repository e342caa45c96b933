//! PostgreSQL repositories

mod course;
mod lecture_video;
mod user;

pub use course::PgCourseRepository;
pub use lecture_video::PgLectureVideoRepository;
pub use user::PgUserRepository;

use anyhow::{Context, Result};
use salingtau_core::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

/// Connect to `DATABASE_URL` and apply pending migrations.
///
/// Returns `Ok(None)` when no database is configured.
pub async fn connect(config: &Config) -> Result<Option<PgPool>> {
    let Some(database_url) = config.database_url() else {
        return Ok(None);
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    // Workspace migrations/ relative to this crate
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

fn to_u32(value: i32, field: &str) -> crate::RepositoryResult<u32> {
    u32::try_from(value)
        .map_err(|_| crate::RepositoryError::InvalidData(format!("negative {}: {}", field, value)))
}
