//! Converts an activity's self-reported result into a canonical
//! `{score, completed, success, progress_percent}` record.
//!
//! Embedded content is not trusted to validate its own output, so nothing in
//! here fails: out-of-range values are clamped, unparseable values default to
//! zero, and every such correction is returned as a `NormalizeWarning` for the
//! caller to log.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SuccessThreshold;

//
// ─── INPUT ─────────────────────────────────────────────────────────────────────
//

/// The `score` field of a report, as it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportedScore {
    Number(f64),
    /// Anything that was not a JSON number (strings, booleans, objects).
    Other(String),
    Missing,
}

//
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

/// Normalized result of a single report.
///
/// `score` and `progress_percent` are percentages in `[0, 100]`, rounded to
/// hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResult {
    pub score: f64,
    pub completed: bool,
    pub success: bool,
    pub progress_percent: f64,
}

/// A recoverable problem found while normalizing a report.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum NormalizeWarning {
    #[error("score {reported} outside [0, 1], clamped to {clamped}")]
    ScoreClamped { reported: f64, clamped: f64 },

    #[error("score percent {reported} outside [0, 100], clamped to {clamped}")]
    ScorePercentClamped { reported: f64, clamped: f64 },

    #[error("non-numeric score {0:?} treated as 0")]
    NonNumericScore(String),

    #[error("report carried no score, treated as 0")]
    MissingScore,

    #[error("progress text {0:?} has a zero total")]
    ZeroTotal(String),

    #[error("progress text {0:?} is not <completed>/<total>")]
    UnparseableProgress(String),

    #[error("progress {reported} outside [0, 100], clamped to {clamped}")]
    ProgressClamped { reported: f64, clamped: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub result: CanonicalResult,
    pub warnings: Vec<NormalizeWarning>,
}

//
// ─── NORMALIZATION ─────────────────────────────────────────────────────────────
//

/// Normalize a raw frame report (`score` in `[0, 1]` plus an optional
/// `"<completed>/<total>"` progress string).
#[must_use]
pub fn normalize_report(
    score: &ReportedScore,
    score_text: Option<&str>,
    threshold: SuccessThreshold,
) -> Normalized {
    let mut warnings = Vec::new();

    let raw = match score {
        ReportedScore::Number(value) => *value,
        ReportedScore::Other(text) => match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                warnings.push(NormalizeWarning::NonNumericScore(text.clone()));
                0.0
            }
        },
        ReportedScore::Missing => {
            warnings.push(NormalizeWarning::MissingScore);
            0.0
        }
    };

    let raw = if raw.is_finite() { raw } else { 0.0 };
    let clamped = raw.clamp(0.0, 1.0);
    if clamped != raw {
        warnings.push(NormalizeWarning::ScoreClamped {
            reported: raw,
            clamped,
        });
    }

    let progress_percent = match score_text {
        Some(text) => {
            let (percent, warning) = parse_progress_text(text);
            warnings.extend(warning);
            percent
        }
        None => 0.0,
    };

    #[allow(clippy::float_cmp)]
    let completed = clamped == 1.0;

    Normalized {
        result: CanonicalResult {
            score: round_hundredths(clamped * 100.0),
            completed,
            success: threshold.is_met_by(clamped),
            progress_percent,
        },
        warnings,
    }
}

/// Normalize a backend write whose score and progress are already
/// percentages.
///
/// Completion and success are derived from the clamped score so the stored
/// flags can never disagree with it.
#[must_use]
pub fn normalize_percentages(
    score_percent: f64,
    progress_percent: f64,
    threshold: SuccessThreshold,
) -> Normalized {
    let mut warnings = Vec::new();

    let score = clamp_percent(score_percent);
    if score != score_percent {
        warnings.push(NormalizeWarning::ScorePercentClamped {
            reported: score_percent,
            clamped: score,
        });
    }

    let progress = clamp_percent(progress_percent);
    if progress != progress_percent {
        warnings.push(NormalizeWarning::ProgressClamped {
            reported: progress_percent,
            clamped: progress,
        });
    }

    #[allow(clippy::float_cmp)]
    let completed = score == 100.0;

    Normalized {
        result: CanonicalResult {
            score: round_hundredths(score),
            completed,
            success: threshold.is_met_by(score / 100.0),
            progress_percent: round_hundredths(progress),
        },
        warnings,
    }
}

/// Parse a human-readable progress string.
///
/// `"3/5"` yields `60.0`; a string without `/` yields `0.0` silently; a
/// zero total or an unparseable fraction yields `0.0` with a warning.
#[must_use]
pub fn parse_progress_text(text: &str) -> (f64, Option<NormalizeWarning>) {
    let Some((done, total)) = text.split_once('/') else {
        return (0.0, None);
    };

    let (Ok(done), Ok(total)) = (done.trim().parse::<u64>(), total.trim().parse::<u64>()) else {
        return (
            0.0,
            Some(NormalizeWarning::UnparseableProgress(text.to_owned())),
        );
    };

    if total == 0 {
        return (0.0, Some(NormalizeWarning::ZeroTotal(text.to_owned())));
    }

    #[allow(clippy::cast_precision_loss)]
    let percent = 100.0 * done as f64 / total as f64;

    if percent > 100.0 {
        return (
            100.0,
            Some(NormalizeWarning::ProgressClamped {
                reported: percent,
                clamped: 100.0,
            }),
        );
    }

    (round_hundredths(percent), None)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Round to two decimal places, matching the precision progress is stored at.
#[must_use]
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
