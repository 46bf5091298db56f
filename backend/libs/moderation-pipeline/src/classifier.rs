//! Sightengine moderation client
//!
//! Scores one frame at a time against the remote classification service.
//! The client performs a single attempt per call; bounded retry is composed
//! by the orchestrator. No state is retained between frames.

use crate::config::SightengineConfig;
use crate::error::{ModerationError, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Model identifier persisted in analysis metadata
pub const ANALYSIS_MODEL_ID: &str = "sightengine:nudity+weapon";

/// Category models requested per check call
const SIGHTENGINE_MODELS: &str = "nudity,weapon";

/// Normalized per-category scores for one frame, 0.0..1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScores {
    pub nudity: f64,
    pub weapon: f64,
}

/// Scores a single frame image against the content-classification service.
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    async fn classify(&self, frame: &Path) -> Result<FrameScores>;
}

/// HTTP client for the Sightengine check endpoint
pub struct SightengineClient {
    http: reqwest::Client,
    endpoint: String,
    api_user: String,
    api_secret: String,
}

impl SightengineClient {
    /// Create a new client with a bounded per-request timeout
    pub fn new(cfg: &SightengineConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ModerationError::Unexpected(format!("http client error: {e}")))?;

        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_user: cfg.api_user.clone(),
            api_secret: cfg.api_secret.clone(),
        })
    }
}

#[async_trait]
impl FrameClassifier for SightengineClient {
    async fn classify(&self, frame: &Path) -> Result<FrameScores> {
        let image = tokio::fs::read(frame)
            .await
            .map_err(|e| ModerationError::Scoring(format!("failed to read frame: {e}")))?;
        let file_name = frame
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame.png".to_string());

        let part = multipart::Part::bytes(image)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| ModerationError::Scoring(format!("invalid frame payload: {e}")))?;
        let form = multipart::Form::new()
            .part("media", part)
            .text("models", SIGHTENGINE_MODELS)
            .text("api_user", self.api_user.clone())
            .text("api_secret", self.api_secret.clone());

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ModerationError::Scoring(format!("sightengine request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ModerationError::Scoring(format!(
                "sightengine returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ModerationError::Scoring(format!("sightengine response parse: {e}")))?;

        let scores = parse_scores(&body)?;
        debug!(nudity = scores.nudity, weapon = scores.weapon, "frame scored");
        Ok(scores)
    }
}

/// Extract normalized scores from a check response body.
///
/// The weapon field is either a bare number or an object whose `classes`
/// map is reduced by maximum across reported subclasses.
fn parse_scores(body: &Value) -> Result<FrameScores> {
    let nudity_block = body.get("nudity").ok_or_else(|| {
        ModerationError::Scoring("invalid sightengine response: missing nudity scores".into())
    })?;
    let nudity = nudity_block
        .get("raw")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let weapon = match body.get("weapon") {
        Some(Value::Object(map)) => map
            .get("classes")
            .and_then(Value::as_object)
            .map(|classes| classes.values().filter_map(Value::as_f64).fold(0.0, f64::max))
            .unwrap_or(0.0),
        Some(value) => value.as_f64().unwrap_or(0.0),
        None => 0.0,
    };

    Ok(FrameScores { nudity, weapon })
}
