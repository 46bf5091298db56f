/// Configuration for the moderation pipeline
///
/// Loads configuration from environment variables with sensible defaults.
use crate::retry::RetryConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ModerationConfig {
    pub media: MediaConfig,
    pub sightengine: SightengineConfig,
    pub retry: RetryConfig,
}

#[derive(Clone, Debug)]
pub struct MediaConfig {
    /// Directory holding uploaded source videos
    pub upload_dir: PathBuf,
    /// Root under which per-job scratch directories are created
    pub scratch_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

#[derive(Clone, Debug)]
pub struct SightengineConfig {
    pub endpoint: String,
    pub api_user: String,
    pub api_secret: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
}

impl ModerationConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let timeout_secs = std::env::var("SIGHTENGINE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);
        let max_retries = std::env::var("MODERATION_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        ModerationConfig {
            media: MediaConfig {
                upload_dir: std::env::var("MEDIA_UPLOAD_DIR")
                    .unwrap_or_else(|_| "uploads".to_string())
                    .into(),
                scratch_dir: std::env::var("MEDIA_SCRATCH_DIR")
                    .unwrap_or_else(|_| "tmp".to_string())
                    .into(),
                ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
                ffprobe_path: std::env::var("FFPROBE_PATH")
                    .unwrap_or_else(|_| "ffprobe".to_string()),
            },
            sightengine: SightengineConfig {
                endpoint: std::env::var("SIGHTENGINE_URL")
                    .unwrap_or_else(|_| "https://api.sightengine.com/1.0/check.json".to_string()),
                api_user: std::env::var("SIGHTENGINE_USER").unwrap_or_default(),
                api_secret: std::env::var("SIGHTENGINE_SECRET").unwrap_or_default(),
                timeout: Duration::from_secs(timeout_secs),
            },
            retry: RetryConfig {
                max_retries,
                ..RetryConfig::default()
            },
        }
    }
}
