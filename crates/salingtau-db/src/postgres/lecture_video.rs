use async_trait::async_trait;
use salingtau_core::{LectureVideo, LectureVideoStatus};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::to_u32;
use crate::repository::LectureVideoRepository;
use crate::{RepositoryError, RepositoryResult};

#[derive(sqlx::FromRow)]
struct LectureVideoRow {
    id: Uuid,
    lecture_id: Uuid,
    status: LectureVideoStatus,
    duration_milliseconds: Option<i64>,
    resolutions: Vec<i32>,
}

impl TryFrom<LectureVideoRow> for LectureVideo {
    type Error = RepositoryError;

    fn try_from(row: LectureVideoRow) -> Result<Self, Self::Error> {
        let duration_milliseconds = row
            .duration_milliseconds
            .map(|ms| {
                u64::try_from(ms).map_err(|_| {
                    RepositoryError::InvalidData(format!("negative duration_milliseconds: {}", ms))
                })
            })
            .transpose()?;

        let resolutions = row
            .resolutions
            .into_iter()
            .map(|r| to_u32(r, "resolution"))
            .collect::<RepositoryResult<Vec<u32>>>()?;

        Ok(LectureVideo {
            id: row.id,
            lecture_id: row.lecture_id,
            status: row.status,
            duration_milliseconds,
            resolutions,
        })
    }
}

/// Repository for lecture video processing state
#[derive(Clone)]
pub struct PgLectureVideoRepository {
    pool: PgPool,
}

impl PgLectureVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LectureVideoRepository for PgLectureVideoRepository {
    #[tracing::instrument(skip(self), fields(db.table = "lecture_videos", db.operation = "select"))]
    async fn find_by_lecture_id(&self, lecture_id: Uuid) -> RepositoryResult<Option<LectureVideo>> {
        let row = sqlx::query_as::<Postgres, LectureVideoRow>(
            r#"
            SELECT id, lecture_id, status, duration_milliseconds, resolutions
            FROM lecture_videos
            WHERE lecture_id = $1
            "#,
        )
        .bind(lecture_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LectureVideo::try_from).transpose()
    }

    #[tracing::instrument(skip(self, video), fields(db.table = "lecture_videos", db.operation = "upsert", db.record_id = %video.id))]
    async fn save(&self, video: &LectureVideo) -> RepositoryResult<()> {
        let duration = video
            .duration_milliseconds
            .map(|ms| {
                i64::try_from(ms).map_err(|_| {
                    RepositoryError::InvalidData(format!("duration out of range: {}", ms))
                })
            })
            .transpose()?;
        let resolutions = video
            .resolutions
            .iter()
            .map(|&r| {
                i32::try_from(r).map_err(|_| {
                    RepositoryError::InvalidData(format!("resolution out of range: {}", r))
                })
            })
            .collect::<RepositoryResult<Vec<i32>>>()?;

        sqlx::query(
            r#"
            INSERT INTO lecture_videos (id, lecture_id, status, duration_milliseconds, resolutions)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                duration_milliseconds = EXCLUDED.duration_milliseconds,
                resolutions = EXCLUDED.resolutions,
                updated_at = NOW()
            "#,
        )
        .bind(video.id)
        .bind(video.lecture_id)
        .bind(video.status)
        .bind(duration)
        .bind(resolutions)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_conversion_rejects_negative_values() {
        let row = LectureVideoRow {
            id: Uuid::nil(),
            lecture_id: Uuid::nil(),
            status: LectureVideoStatus::Ready,
            duration_milliseconds: Some(-1),
            resolutions: vec![240],
        };
        assert!(LectureVideo::try_from(row).is_err());
    }

    #[test]
    fn row_conversion() {
        let row = LectureVideoRow {
            id: Uuid::nil(),
            lecture_id: Uuid::nil(),
            status: LectureVideoStatus::Ready,
            duration_milliseconds: Some(125_400),
            resolutions: vec![240, 360],
        };
        let video = LectureVideo::try_from(row).unwrap();
        assert_eq!(video.duration_milliseconds, Some(125_400));
        assert_eq!(video.resolutions, vec![240, 360]);
    }
}
