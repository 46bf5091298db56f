//! Moderation job orchestrator
//!
//! Drives one video through frame extraction, per-frame scoring,
//! aggregation, the publication policy, and conditional persistence,
//! reporting progress to the uploading user along the way. The scratch
//! directory is removed on every exit path, including persistence
//! failures.

use crate::aggregator::{self, ScoredFrame};
use crate::classifier::{FrameClassifier, ANALYSIS_MODEL_ID};
use crate::config::ModerationConfig;
use crate::error::{ModerationError, Result};
use crate::extractor::FrameExtractor;
use crate::policy;
use crate::progress::{ProgressChannel, ProgressEvent, Stage};
use crate::retry::{self, RetryConfig};
use crate::store::{SaveOutcome, VideoStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use video_core::{AnalysisMeta, VideoStatus};

/// Percent complete reported on entry to each stage
const PROGRESS_EXTRACTING: u8 = 20;
const PROGRESS_SCORING: u8 = 50;
const PROGRESS_AGGREGATING: u8 = 80;

/// How one moderation job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    /// Result persisted and reported to the uploader.
    Completed {
        status: VideoStatus,
        risk_score: i32,
    },
    /// The record disappeared or changed mid-job; the result was discarded.
    Discarded,
    /// The record was already gone when the job started.
    Skipped,
}

/// Drives moderation jobs. Cheap to clone and shared across jobs; per-job
/// state lives on the task running the job.
#[derive(Clone)]
pub struct ModerationPipeline {
    store: Arc<dyn VideoStore>,
    extractor: Arc<dyn FrameExtractor>,
    classifier: Arc<dyn FrameClassifier>,
    progress: ProgressChannel,
    upload_dir: PathBuf,
    scratch_dir: PathBuf,
    retry: RetryConfig,
}

impl ModerationPipeline {
    pub fn new(
        store: Arc<dyn VideoStore>,
        extractor: Arc<dyn FrameExtractor>,
        classifier: Arc<dyn FrameClassifier>,
        progress: ProgressChannel,
        config: &ModerationConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            classifier,
            progress,
            upload_dir: config.media.upload_dir.clone(),
            scratch_dir: config.media.scratch_dir.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Hand off a job after a validated upload.
    ///
    /// Fire-and-forget: the job runs on its own task and reports through
    /// the progress channel; the caller does not wait.
    pub fn enqueue(&self, video_id: Uuid, user_id: Uuid) {
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.process(video_id, user_id).await;
        });
    }

    /// Run one job to a terminal state.
    ///
    /// Never returns an error: failures are recorded on the video record
    /// (best-effort) and published as a terminal failure event.
    pub async fn process(&self, video_id: Uuid, user_id: Uuid) {
        info!(%video_id, "starting video moderation");
        let scratch = self.scratch_dir.join(video_id.to_string());

        match self.run(video_id, user_id, &scratch).await {
            Ok(JobOutcome::Completed { status, risk_score }) => {
                info!(
                    %video_id,
                    status = status.as_str(),
                    risk_score,
                    "video moderation complete"
                );
            }
            Ok(JobOutcome::Discarded) => {
                info!(%video_id, "video changed or deleted during processing, result discarded");
            }
            Ok(JobOutcome::Skipped) => {
                debug!(%video_id, "video already deleted, skipping job");
            }
            Err(err) => {
                error!(%video_id, "video moderation failed: {err}");
                self.record_failure(video_id, user_id, &err).await;
            }
        }

        self.cleanup_scratch(&scratch).await;
    }

    async fn run(&self, video_id: Uuid, user_id: Uuid, scratch: &Path) -> Result<JobOutcome> {
        let Some(mut video) = self.store.load(video_id).await? else {
            return Ok(JobOutcome::Skipped);
        };

        self.progress
            .publish(user_id, ProgressEvent::queued(video_id))
            .await;

        let source = self.upload_dir.join(&video.filename);
        tokio::fs::create_dir_all(scratch).await?;

        self.progress
            .publish(
                user_id,
                ProgressEvent::stage(video_id, PROGRESS_EXTRACTING, Stage::Extracting),
            )
            .await;
        let frames = self.extractor.extract_frames(&source, scratch).await?;

        self.progress
            .publish(
                user_id,
                ProgressEvent::stage(video_id, PROGRESS_SCORING, Stage::Scoring),
            )
            .await;

        let mut scored = Vec::with_capacity(frames.len());
        let mut failed_frames = 0usize;
        for frame in &frames {
            match retry::with_retry(&self.retry, || self.classifier.classify(&frame.path)).await {
                Ok(scores) => scored.push(ScoredFrame {
                    frame: frame.file_name(),
                    scores,
                }),
                Err(err) => {
                    warn!(
                        %video_id,
                        frame = %frame.file_name(),
                        "frame skipped after repeated failures: {err}"
                    );
                    failed_frames += 1;
                }
            }
        }

        self.progress
            .publish(
                user_id,
                ProgressEvent::stage(video_id, PROGRESS_AGGREGATING, Stage::Aggregating),
            )
            .await;
        let analysis = aggregator::aggregate(&scored, failed_frames)?;
        let status = policy::decide(analysis.risk_score);

        video.status = status;
        video.risk_score = analysis.risk_percent();
        video.violations = analysis.violations.clone();
        video.analysis_meta = Some(AnalysisMeta {
            analyzed_frames: analysis.analyzed_frames,
            failed_frames: analysis.failed_frames,
            model: ANALYSIS_MODEL_ID.to_string(),
        });
        video.error_reason = None;

        match self.store.conditional_save(&video).await? {
            SaveOutcome::Persisted => {
                self.progress
                    .publish(
                        user_id,
                        ProgressEvent::completed(video_id, status, video.risk_score),
                    )
                    .await;
                Ok(JobOutcome::Completed {
                    status,
                    risk_score: video.risk_score,
                })
            }
            SaveOutcome::VersionConflict | SaveOutcome::Missing => Ok(JobOutcome::Discarded),
        }
    }

    /// Record a fatal job error on the video, best-effort.
    ///
    /// A concurrent delete or a store failure here is logged and swallowed;
    /// the terminal failure event is published either way.
    async fn record_failure(&self, video_id: Uuid, user_id: Uuid, err: &ModerationError) {
        let reason = err.to_string();

        match self.store.load(video_id).await {
            Ok(Some(mut video)) => {
                video.status = VideoStatus::Error;
                video.error_reason = Some(reason.clone());
                match self.store.conditional_save(&video).await {
                    Ok(SaveOutcome::Persisted) => {}
                    Ok(SaveOutcome::VersionConflict) | Ok(SaveOutcome::Missing) => {
                        info!(%video_id, "video changed or deleted during error handling, skipping save");
                    }
                    Err(save_err) => {
                        warn!(%video_id, "failed to record moderation error: {save_err}");
                    }
                }
            }
            Ok(None) => {
                info!(%video_id, "video deleted during error handling, skipping save");
            }
            Err(load_err) => {
                warn!(%video_id, "failed to reload video for error recording: {load_err}");
            }
        }

        self.progress
            .publish(user_id, ProgressEvent::failed(video_id, reason))
            .await;
    }

    /// Remove the job's scratch directory and every frame sample in it.
    async fn cleanup_scratch(&self, scratch: &Path) {
        match tokio::fs::remove_dir_all(scratch).await {
            Ok(()) => debug!(path = %scratch.display(), "scratch directory removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %scratch.display(), "failed to remove scratch directory: {err}");
            }
        }
    }
}
