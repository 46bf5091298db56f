//! Video persistence seam
//!
//! The pipeline never locks a video row. It loads the record once and
//! conditionally writes it back; a lost write (row deleted or version
//! advanced by a concurrent actor) is reported as a tagged outcome, not an
//! error, so the caller can discard its result without complaint.

use crate::error::{ModerationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;
use video_core::{AnalysisMeta, Video, VideoStatus, Violation};

/// Outcome of a version-checked save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was updated and its version advanced.
    Persisted,
    /// The record exists but was modified since it was loaded.
    VersionConflict,
    /// The record no longer exists.
    Missing,
}

/// Read/write access to video records
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn load(&self, video_id: Uuid) -> Result<Option<Video>>;

    /// Write the record if its stored version still matches
    /// `video.version`; bump the version on success.
    async fn conditional_save(&self, video: &Video) -> Result<SaveOutcome>;
}

/// Postgres-backed store over the platform's `videos` table
pub struct PgVideoStore {
    pool: PgPool,
}

impl PgVideoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct VideoRow {
    id: Uuid,
    owner_id: Uuid,
    tenant_id: Uuid,
    filename: String,
    title: String,
    description: Option<String>,
    status: String,
    size_bytes: i64,
    duration_seconds: Option<i32>,
    views: i64,
    risk_score: i32,
    violations: Json<Vec<Violation>>,
    analysis_meta: Option<Json<AnalysisMeta>>,
    error_reason: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VideoRow {
    fn into_video(self) -> Result<Video> {
        let status = VideoStatus::from_str(&self.status).map_err(ModerationError::Unexpected)?;

        Ok(Video {
            id: self.id,
            owner_id: self.owner_id,
            tenant_id: self.tenant_id,
            filename: self.filename,
            title: self.title,
            description: self.description,
            status,
            size_bytes: self.size_bytes,
            duration_seconds: self.duration_seconds,
            views: self.views,
            risk_score: self.risk_score,
            violations: self.violations.0,
            analysis_meta: self.analysis_meta.map(|meta| meta.0),
            error_reason: self.error_reason,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    async fn load(&self, video_id: Uuid) -> Result<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>(
            "SELECT id, owner_id, tenant_id, filename, title, description, status, \
             size_bytes, duration_seconds, views, risk_score, violations, analysis_meta, \
             error_reason, version, created_at, updated_at \
             FROM videos WHERE id = $1",
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VideoRow::into_video).transpose()
    }

    async fn conditional_save(&self, video: &Video) -> Result<SaveOutcome> {
        let result = sqlx::query(
            "UPDATE videos \
             SET status = $2, risk_score = $3, violations = $4, analysis_meta = $5, \
                 error_reason = $6, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $7",
        )
        .bind(video.id)
        .bind(video.status.as_str())
        .bind(video.risk_score)
        .bind(Json(&video.violations))
        .bind(video.analysis_meta.as_ref().map(Json))
        .bind(&video.error_reason)
        .bind(video.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(SaveOutcome::Persisted);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM videos WHERE id = $1)")
            .bind(video.id)
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            SaveOutcome::VersionConflict
        } else {
            SaveOutcome::Missing
        })
    }
}
