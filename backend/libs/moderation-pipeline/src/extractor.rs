//! Frame extraction via ffmpeg
//!
//! Samples a fixed set of still frames at relative clip positions from a
//! source video into a job-scoped scratch directory. Extraction is
//! all-or-nothing: either every expected frame exists on success or the
//! stage failed.

use crate::error::{ModerationError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;
use video_core::constants::{FRAME_SAMPLE_HEIGHT, FRAME_SAMPLE_POSITIONS, FRAME_SAMPLE_WIDTH};

/// A still frame sampled from the source clip.
///
/// Ephemeral: lives under the job's scratch directory and is removed with
/// it when the job ends.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Relative position within the clip, 0.0..1.0
    pub position: f64,
    pub path: PathBuf,
}

impl FrameSample {
    /// File name used to reference this frame in violation records.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Extracts sample frames from a source video.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Produce one frame per sample position under `out_dir`.
    ///
    /// Must not touch the source file and must write only below `out_dir`.
    async fn extract_frames(&self, source: &Path, out_dir: &Path) -> Result<Vec<FrameSample>>;
}

/// FFmpeg-backed frame extractor
pub struct FfmpegFrameExtractor {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe the clip duration in seconds using ffprobe
    async fn probe_duration(&self, source: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_format",
                "-of",
                "json",
                source.to_string_lossy().as_ref(),
            ])
            .output()
            .await
            .map_err(|e| ModerationError::Extraction(format!("ffprobe spawn error: {e}")))?;

        if !output.status.success() {
            return Err(ModerationError::Extraction(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ModerationError::Extraction(format!("ffprobe json parse: {e}")))?;

        let duration = json
            .get("format")
            .and_then(|f| f.get("duration"))
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        if duration <= 0.0 {
            return Err(ModerationError::Extraction(
                "could not determine clip duration".to_string(),
            ));
        }

        Ok(duration)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frames(&self, source: &Path, out_dir: &Path) -> Result<Vec<FrameSample>> {
        if tokio::fs::metadata(source).await.is_err() {
            return Err(ModerationError::Extraction(format!(
                "source video missing: {}",
                source.display()
            )));
        }

        let duration = self.probe_duration(source).await?;
        let scale = format!("scale={FRAME_SAMPLE_WIDTH}:{FRAME_SAMPLE_HEIGHT}");

        let mut samples = Vec::with_capacity(FRAME_SAMPLE_POSITIONS.len());
        for (index, position) in FRAME_SAMPLE_POSITIONS.iter().enumerate() {
            let timestamp = format!("{:.3}", duration * position);
            let frame_path = out_dir.join(format!("frame-{}.png", index + 1));

            let output = Command::new(&self.ffmpeg_path)
                .args([
                    "-y",
                    "-ss",
                    &timestamp,
                    "-i",
                    source.to_string_lossy().as_ref(),
                    "-frames:v",
                    "1",
                    "-vf",
                    &scale,
                    frame_path.to_string_lossy().as_ref(),
                ])
                .output()
                .await
                .map_err(|e| ModerationError::Extraction(format!("ffmpeg spawn error: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ModerationError::Extraction(format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    stderr.trim()
                )));
            }

            if tokio::fs::metadata(&frame_path).await.is_err() {
                return Err(ModerationError::Extraction(format!(
                    "expected frame not produced: {}",
                    frame_path.display()
                )));
            }

            debug!(position, path = %frame_path.display(), "frame extracted");

            samples.push(FrameSample {
                position: *position,
                path: frame_path,
            });
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_source_is_extraction_error() {
        let extractor = FfmpegFrameExtractor::new("ffmpeg", "ffprobe");
        let scratch = tempfile::tempdir().unwrap();

        let err = extractor
            .extract_frames(Path::new("/no/such/video.mp4"), scratch.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ModerationError::Extraction(_)));
        assert!(err.to_string().contains("source video missing"));
    }

    #[test]
    fn test_frame_file_name() {
        let sample = FrameSample {
            position: 0.30,
            path: PathBuf::from("/tmp/job/frame-2.png"),
        };
        assert_eq!(sample.file_name(), "frame-2.png");
    }
}
