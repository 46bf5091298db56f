//! Core video data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Video lifecycle status.
///
/// `ReviewRequired` and `Blocked` are moderation policy outcomes and part of
/// the persisted enumeration, so a moderation decision is stored as-is
/// instead of being collapsed onto a neighboring status. Once a status other
/// than `Processing` is written for an upload it is terminal; only an
/// operator action moves a video back to `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Processing,
    Draft,
    Published,
    Archived,
    Flagged,
    Error,
    ReviewRequired,
    Blocked,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Draft => "draft",
            VideoStatus::Published => "published",
            VideoStatus::Archived => "archived",
            VideoStatus::Flagged => "flagged",
            VideoStatus::Error => "error",
            VideoStatus::ReviewRequired => "review_required",
            VideoStatus::Blocked => "blocked",
        }
    }

    /// Whether an automatic pipeline may still transition this video.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VideoStatus::Processing)
    }
}

impl std::str::FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(VideoStatus::Processing),
            "draft" => Ok(VideoStatus::Draft),
            "published" => Ok(VideoStatus::Published),
            "archived" => Ok(VideoStatus::Archived),
            "flagged" => Ok(VideoStatus::Flagged),
            "error" => Ok(VideoStatus::Error),
            "review_required" => Ok(VideoStatus::ReviewRequired),
            "blocked" => Ok(VideoStatus::Blocked),
            other => Err(format!("unknown video status: {other}")),
        }
    }
}

/// A flagged frame whose per-category score exceeded a threshold.
///
/// Scores are on the 0-100 scale used for persisted moderation results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// File name of the sampled frame, e.g. `frame-3.png`.
    pub frame: String,
    pub nudity: i32,
    pub weapon: i32,
    /// This frame's weighted contribution to the clip risk.
    pub risk: i32,
}

/// Summary of one moderation analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub analyzed_frames: i32,
    pub failed_frames: i32,
    /// Identifier of the classification service and category models used.
    pub model: String,
}

/// Core video metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
    /// File name under the platform's upload directory.
    pub filename: String,
    pub title: String,
    pub description: Option<String>,
    pub status: VideoStatus,
    pub size_bytes: i64,
    pub duration_seconds: Option<i32>,
    pub views: i64,
    /// Moderation risk, 0-100.
    pub risk_score: i32,
    pub violations: Vec<Violation>,
    pub analysis_meta: Option<AnalysisMeta>,
    pub error_reason: Option<String>,
    /// Optimistic-concurrency version, bumped on every conditional save.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
