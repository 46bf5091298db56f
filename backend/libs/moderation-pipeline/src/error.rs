use thiserror::Error;

/// Result type for moderation pipeline operations
pub type Result<T> = std::result::Result<T, ModerationError>;

/// Errors raised while moderating an uploaded video
#[derive(Debug, Error)]
pub enum ModerationError {
    /// Frame extraction failed. Fatal for the job; partial extraction is
    /// never accepted.
    #[error("frame extraction failed: {0}")]
    Extraction(String),

    /// One scoring attempt for one frame failed. Contained by the retry
    /// loop; after the attempt budget is spent the frame is counted as
    /// failed and the job continues.
    #[error("frame scoring failed: {0}")]
    Scoring(String),

    /// Every sampled frame failed scoring. Fatal for the job.
    #[error("no frames were successfully analyzed")]
    NoUsableFrames,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Unexpected(String),
}
