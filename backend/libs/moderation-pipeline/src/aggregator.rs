//! Clip-level risk aggregation
//!
//! Folds per-frame scores into clip metrics, a single weighted risk score,
//! and the list of flagged frames. Frames that failed scoring are excluded
//! from the means and only counted.

use crate::classifier::FrameScores;
use crate::error::{ModerationError, Result};
use video_core::Violation;

/// Nudity score above which a frame is flagged
const NUDITY_FLAG_THRESHOLD: f64 = 0.6;
/// Weapon score above which a frame is flagged
const WEAPON_FLAG_THRESHOLD: f64 = 0.5;
/// Weight of the nudity mean in the clip risk score
const NUDITY_WEIGHT: f64 = 0.5;
/// Weight of the weapon mean; a corroborating signal, so the weights do
/// not sum to 1
const WEAPON_WEIGHT: f64 = 0.35;

/// Scores for one successfully analyzed frame.
#[derive(Debug, Clone)]
pub struct ScoredFrame {
    /// File name of the sampled frame
    pub frame: String,
    pub scores: FrameScores,
}

/// Clip-level aggregation of per-frame scores.
#[derive(Debug, Clone)]
pub struct ClipAnalysis {
    pub nudity_score: f64,
    pub weapon_score: f64,
    /// Weighted risk, 0.0..1.0
    pub risk_score: f64,
    pub violations: Vec<Violation>,
    pub analyzed_frames: i32,
    pub failed_frames: i32,
}

impl ClipAnalysis {
    /// Risk on the persisted 0-100 scale
    pub fn risk_percent(&self) -> i32 {
        to_percent(self.risk_score)
    }
}

/// Fold per-frame scores into clip metrics and flagged frames.
///
/// Fails with [`ModerationError::NoUsableFrames`] when zero frames
/// succeeded; that is fatal for the job, unlike individual frame failures.
pub fn aggregate(scored: &[ScoredFrame], failed_frames: usize) -> Result<ClipAnalysis> {
    if scored.is_empty() {
        return Err(ModerationError::NoUsableFrames);
    }

    let count = scored.len() as f64;
    let nudity_score = scored.iter().map(|f| f.scores.nudity).sum::<f64>() / count;
    let weapon_score = scored.iter().map(|f| f.scores.weapon).sum::<f64>() / count;
    let risk_score = NUDITY_WEIGHT * nudity_score + WEAPON_WEIGHT * weapon_score;

    let violations = scored
        .iter()
        .filter(|f| {
            f.scores.nudity > NUDITY_FLAG_THRESHOLD || f.scores.weapon > WEAPON_FLAG_THRESHOLD
        })
        .map(|f| Violation {
            frame: f.frame.clone(),
            nudity: to_percent(f.scores.nudity),
            weapon: to_percent(f.scores.weapon),
            risk: to_percent(NUDITY_WEIGHT * f.scores.nudity + WEAPON_WEIGHT * f.scores.weapon),
        })
        .collect();

    Ok(ClipAnalysis {
        nudity_score,
        weapon_score,
        risk_score,
        violations,
        analyzed_frames: scored.len() as i32,
        failed_frames: failed_frames as i32,
    })
}

fn to_percent(score: f64) -> i32 {
    (score * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, nudity: f64, weapon: f64) -> ScoredFrame {
        ScoredFrame {
            frame: name.to_string(),
            scores: FrameScores { nudity, weapon },
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_clean_clip() {
        let scored: Vec<_> = (1..=5)
            .map(|i| frame(&format!("frame-{i}.png"), 0.1, 0.05))
            .collect();

        let analysis = aggregate(&scored, 0).unwrap();
        assert!(close(analysis.nudity_score, 0.1));
        assert!(close(analysis.weapon_score, 0.05));
        assert!(close(analysis.risk_score, 0.0675));
        assert_eq!(analysis.risk_percent(), 7);
        assert!(analysis.violations.is_empty());
        assert_eq!(analysis.analyzed_frames, 5);
        assert_eq!(analysis.failed_frames, 0);
    }

    #[test]
    fn test_failed_frames_excluded_from_means() {
        let scored = vec![
            frame("frame-1.png", 0.8, 0.1),
            frame("frame-2.png", 0.8, 0.1),
            frame("frame-3.png", 0.8, 0.1),
        ];

        let analysis = aggregate(&scored, 2).unwrap();
        assert!(close(analysis.nudity_score, (0.8 + 0.8 + 0.8) / 3.0));
        assert!(close(analysis.weapon_score, (0.1 + 0.1 + 0.1) / 3.0));
        assert_eq!(analysis.analyzed_frames, 3);
        assert_eq!(analysis.failed_frames, 2);
        assert_eq!(analysis.violations.len(), 3);
    }

    #[test]
    fn test_no_usable_frames_is_fatal() {
        let err = aggregate(&[], 5).unwrap_err();
        assert!(matches!(err, ModerationError::NoUsableFrames));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let a = vec![
            frame("frame-1.png", 0.9, 0.0),
            frame("frame-2.png", 0.2, 0.5),
            frame("frame-3.png", 0.4, 0.3),
        ];
        let b = vec![a[2].clone(), a[0].clone(), a[1].clone()];

        let first = aggregate(&a, 0).unwrap();
        let second = aggregate(&b, 0).unwrap();
        assert!(close(first.risk_score, second.risk_score));
    }

    #[test]
    fn test_flag_thresholds_are_exclusive() {
        // Exactly at a threshold is not a violation; just above is.
        let scored = vec![
            frame("frame-1.png", 0.6, 0.5),
            frame("frame-2.png", 0.61, 0.0),
            frame("frame-3.png", 0.0, 0.51),
        ];

        let analysis = aggregate(&scored, 0).unwrap();
        let flagged: Vec<_> = analysis
            .violations
            .iter()
            .map(|v| v.frame.as_str())
            .collect();
        assert_eq!(flagged, vec!["frame-2.png", "frame-3.png"]);
    }

    #[test]
    fn test_violation_scores_are_percentage_scaled() {
        let scored = vec![frame("frame-4.png", 0.8, 0.1)];

        let analysis = aggregate(&scored, 0).unwrap();
        let violation = &analysis.violations[0];
        assert_eq!(violation.nudity, 80);
        assert_eq!(violation.weapon, 10);
        assert_eq!(
            violation.risk,
            ((0.5 * 0.8 + 0.35 * 0.1) * 100.0_f64).round() as i32
        );
    }
}
