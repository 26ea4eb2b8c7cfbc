//! Transition and sufficiency rules shared by both controllers.
//!
//! Everything here is pure: no I/O, no clock, no randomness.

use serde::{Deserialize, Serialize};

use crate::services::AnalysisOutcome;
use crate::session::ReviewAnalysis;

/// Identified percentage at or above which a review is sufficient.
pub const SUFFICIENCY_THRESHOLD: f64 = 90.0;

/// What the generation loop does after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationDecision {
    /// Ask the generator to add the missing errors.
    Regenerate,
    /// Accept the code as it is.
    Complete,
}

/// What the review loop does after an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Wait for another review.
    Continue,
    /// Stop and write the report.
    Complete,
}

/// Decides whether to regenerate after an evaluation.
///
/// An exhausted budget wins over everything, so the loop makes at most `max`
/// evaluation calls and `max - 1` regeneration calls.
///
/// # Examples
///
/// ```
/// use drill_engine::decision::{decide_generation, GenerationDecision};
///
/// assert_eq!(decide_generation(1, 3, false, 2), GenerationDecision::Regenerate);
/// assert_eq!(decide_generation(3, 3, false, 2), GenerationDecision::Complete);
/// assert_eq!(decide_generation(1, 3, true, 0), GenerationDecision::Complete);
/// ```
#[must_use]
pub const fn decide_generation(
    attempts: u32,
    max_attempts: u32,
    valid: bool,
    missing_count: usize,
) -> GenerationDecision {
    if attempts >= max_attempts || valid {
        GenerationDecision::Complete
    } else if missing_count > 0 {
        GenerationDecision::Regenerate
    } else {
        GenerationDecision::Complete
    }
}

/// Decides whether the review loop continues.
///
/// `iteration` is the iteration the learner would submit next.
#[must_use]
pub const fn decide_review(sufficient: bool, iteration: u32, max_iterations: u32) -> ReviewDecision {
    if sufficient || iteration > max_iterations {
        ReviewDecision::Complete
    } else {
        ReviewDecision::Continue
    }
}

/// Identified share of `total`, in percent. Zero when `total` is zero.
#[must_use]
pub fn identified_percentage(identified: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(identified) * 100.0 / f64::from(total)
    }
}

/// A review is sufficient when it found everything or reached the threshold.
#[must_use]
pub fn is_sufficient(identified: u32, total: u32, percentage: f64) -> bool {
    identified >= total || percentage >= SUFFICIENCY_THRESHOLD
}

/// Normalizes a raw analysis against the session's original error count.
///
/// The identified count is clamped into `0..=original_error_count`, the total
/// is forced to `original_error_count`, and the percentage and sufficiency are
/// derived locally.
#[must_use]
pub fn normalize_analysis(raw: AnalysisOutcome, original_error_count: u32) -> ReviewAnalysis {
    let clamped = raw.identified_count.clamp(0, i64::from(original_error_count));
    let identified_count = u32::try_from(clamped).unwrap_or(0);
    let total_problems = original_error_count;
    let identified_percentage = identified_percentage(identified_count, total_problems);

    ReviewAnalysis {
        identified: raw.identified,
        missed: raw.missed,
        identified_count,
        total_problems,
        identified_percentage,
        sufficient: is_sufficient(identified_count, total_problems, identified_percentage),
        failure: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(identified_count: i64, total_problems: i64) -> AnalysisOutcome {
        AnalysisOutcome {
            identified_count,
            total_problems,
            ..AnalysisOutcome::default()
        }
    }

    #[test]
    fn test_decide_generation_budget_exhausted() {
        // Single evaluation with one missing error still completes
        assert_eq!(decide_generation(1, 1, false, 1), GenerationDecision::Complete);
        assert_eq!(decide_generation(4, 3, false, 1), GenerationDecision::Complete);
    }

    #[test]
    fn test_decide_generation_valid() {
        assert_eq!(decide_generation(1, 3, true, 0), GenerationDecision::Complete);
    }

    #[test]
    fn test_decide_generation_regenerate() {
        assert_eq!(decide_generation(2, 3, false, 1), GenerationDecision::Regenerate);
    }

    #[test]
    fn test_decide_generation_fallback() {
        assert_eq!(decide_generation(1, 3, false, 0), GenerationDecision::Complete);
    }

    #[test]
    fn test_decide_review() {
        assert_eq!(decide_review(true, 1, 3), ReviewDecision::Complete);
        assert_eq!(decide_review(false, 4, 3), ReviewDecision::Complete);
        assert_eq!(decide_review(false, 3, 3), ReviewDecision::Continue);
        assert_eq!(decide_review(false, 2, 3), ReviewDecision::Continue);
    }

    #[test]
    fn test_all_identified_is_sufficient() {
        let analysis = normalize_analysis(raw(5, 5), 5);
        assert!(analysis.sufficient);
        assert!((analysis.identified_percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ninety_percent_is_sufficient() {
        let analysis = normalize_analysis(raw(9, 10), 10);
        assert!((analysis.identified_percentage - 90.0).abs() < f64::EPSILON);
        assert!(analysis.sufficient);
    }

    #[test]
    fn test_eighty_percent_is_not_sufficient() {
        let analysis = normalize_analysis(raw(8, 10), 10);
        assert!((analysis.identified_percentage - 80.0).abs() < f64::EPSILON);
        assert!(!analysis.sufficient);
    }

    #[test]
    fn test_normalize_clamps_and_forces_total() {
        let analysis = normalize_analysis(raw(12, 40), 4);
        assert_eq!(analysis.identified_count, 4);
        assert_eq!(analysis.total_problems, 4);

        let analysis = normalize_analysis(raw(-3, 4), 4);
        assert_eq!(analysis.identified_count, 0);
        assert!(!analysis.sufficient);
    }

    #[test]
    fn test_identified_percentage_zero_total() {
        assert!(identified_percentage(0, 0).abs() < f64::EPSILON);
    }
}
