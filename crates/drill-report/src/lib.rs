//! CodeDrill Report Generation
//!
//! This crate builds the comparison report shown to a learner once a practice
//! session's review loop has finished. The engine first asks its report
//! service for a narrative report. When that service is unavailable, this
//! crate produces a deterministic report from the counts the engine already
//! knows.
//!
//! # Types
//!
//! - [`ReportInput`] - Everything the engine knows about a finished session
//! - [`Report`] - The assembled report
//! - [`PerformanceBucket`] - Qualitative grade derived from identified/total counts
//!
//! # Generators
//!
//! - [`ReportGenerator`] - Turns a [`ReportInput`] into a [`Report`]
//! - [`MarkdownGenerator`] - Renders a [`Report`] for humans
//! - [`json::JsonGenerator`] - Serializes a [`Report`] to JSON
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use drill_report::{AttemptInput, MarkdownGenerator, PerformanceBucket, ReportGenerator, ReportInput};
//!
//! let now = Utc::now();
//! let input = ReportInput {
//!     session_id: "b7e1".to_string(),
//!     domain: "banking".to_string(),
//!     difficulty: "medium".to_string(),
//!     code_length: "short".to_string(),
//!     original_error_count: 2,
//!     max_iterations: 3,
//!     review_sufficient: true,
//!     attempts: vec![AttemptInput {
//!         iteration: 1,
//!         identified: vec!["Logical - Off-by-one".to_string()],
//!         missed: vec![],
//!         identified_count: 2,
//!         identified_percentage: 100.0,
//!         guidance: None,
//!         submitted_at: now,
//!     }],
//!     started_at: now,
//!     ended_at: now,
//! };
//!
//! let report = ReportGenerator::new(input).generate();
//! assert_eq!(report.summary.bucket, PerformanceBucket::Excellent);
//! assert!(MarkdownGenerator::new(&report).generate().contains("Excellent"));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// PerformanceBucket
// ============================================================================

/// Share of known problems above which a review counts as good progress.
const GOOD_PROGRESS_RATIO: f64 = 0.7;

/// Qualitative grade of a finished review loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBucket {
    /// Every known problem was identified.
    Excellent,
    /// More than 70% of the known problems were identified.
    GoodProgress,
    /// Everything else.
    #[default]
    NeedsImprovement,
}

impl PerformanceBucket {
    /// Grades `identified` out of `total` known problems.
    ///
    /// # Examples
    ///
    /// ```
    /// use drill_report::PerformanceBucket;
    ///
    /// assert_eq!(PerformanceBucket::from_counts(4, 4), PerformanceBucket::Excellent);
    /// assert_eq!(PerformanceBucket::from_counts(8, 10), PerformanceBucket::GoodProgress);
    /// assert_eq!(PerformanceBucket::from_counts(7, 10), PerformanceBucket::NeedsImprovement);
    /// ```
    #[must_use]
    pub fn from_counts(identified: u32, total: u32) -> Self {
        if identified == total {
            Self::Excellent
        } else if f64::from(identified) > GOOD_PROGRESS_RATIO * f64::from(total) {
            Self::GoodProgress
        } else {
            Self::NeedsImprovement
        }
    }

    /// Returns the lowercase label used in reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::GoodProgress => "good progress",
            Self::NeedsImprovement => "needs improvement",
        }
    }
}

impl std::fmt::Display for PerformanceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Input types (local copies to avoid a dependency on the engine crate)
// ============================================================================

/// One analyzed review attempt, as seen by the report generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptInput {
    /// Iteration number of the attempt (1-indexed).
    pub iteration: u32,
    /// Known problems the learner identified.
    pub identified: Vec<String>,
    /// Known problems the learner missed.
    pub missed: Vec<String>,
    /// Normalized identified count.
    pub identified_count: u32,
    /// Identified share of the known problems, in percent.
    pub identified_percentage: f64,
    /// Guidance that was offered after this attempt.
    pub guidance: Option<String>,
    /// When the learner submitted the attempt.
    pub submitted_at: DateTime<Utc>,
}

/// Everything known about a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    /// Identifier of the practice session.
    pub session_id: String,
    /// Domain the generated code was set in.
    pub domain: String,
    /// Difficulty label.
    pub difficulty: String,
    /// Code length label.
    pub code_length: String,
    /// Number of errors injected into the code; the denominator for every percentage.
    pub original_error_count: u32,
    /// Review iteration budget.
    pub max_iterations: u32,
    /// Whether the review loop ended because the review was sufficient.
    pub review_sufficient: bool,
    /// Analyzed attempts in iteration order.
    pub attempts: Vec<AttemptInput>,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the review loop ended.
    pub ended_at: DateTime<Utc>,
}

// ============================================================================
// Report
// ============================================================================

/// Complete comparison report for one practice session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    /// Identifier of the practice session.
    pub session_id: String,

    /// High-level outcome of the session.
    pub summary: ReportSummary,

    /// One entry per analyzed attempt.
    pub attempts: Vec<AttemptEntry>,

    /// Known problems identified in the final attempt.
    pub identified_problems: Vec<String>,

    /// Known problems still missed after the final attempt.
    pub missed_problems: Vec<String>,

    /// Prioritized suggestions for the next session.
    pub recommendations: Vec<Recommendation>,
}

impl Report {
    /// Serializes the report to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Serialization` if JSON serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }
}

/// High-level outcome of a practice session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Domain the generated code was set in.
    pub domain: String,
    /// Difficulty label.
    pub difficulty: String,
    /// Code length label.
    pub code_length: String,
    /// Number of known problems in the code.
    pub total_problems: u32,
    /// Known problems identified by the final attempt.
    pub identified_count: u32,
    /// Known problems missed by the final attempt.
    pub missed_count: u32,
    /// Identified share, in percent.
    pub identified_percentage: f64,
    /// Qualitative grade.
    pub bucket: PerformanceBucket,
    /// Number of review attempts analyzed.
    pub iterations_used: u32,
    /// Review iteration budget.
    pub max_iterations: u32,
    /// Whether the review was judged sufficient.
    pub review_sufficient: bool,
    /// Wall-clock duration of the session in seconds.
    pub duration_seconds: u64,
}

/// Per-attempt line in the report timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptEntry {
    /// Iteration number.
    pub iteration: u32,
    /// Normalized identified count.
    pub identified_count: u32,
    /// Identified share, in percent.
    pub identified_percentage: f64,
    /// Guidance offered after the attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
}

/// A prioritized improvement suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Priority (1 = highest).
    pub priority: u32,
    /// What to do.
    pub description: String,
}

impl Recommendation {
    /// Creates a new recommendation.
    #[must_use]
    pub fn new(priority: u32, description: impl Into<String>) -> Self {
        Self {
            priority,
            description: description.into(),
        }
    }
}

// ============================================================================
// ReportGenerator
// ============================================================================

/// Builds a [`Report`] from locally known session data.
///
/// The result depends only on the input, so the same finished session always
/// yields the same report.
pub struct ReportGenerator {
    input: ReportInput,
}

impl ReportGenerator {
    /// Creates a generator for the given input.
    #[must_use]
    pub const fn new(input: ReportInput) -> Self {
        Self { input }
    }

    /// Assembles the report.
    #[must_use]
    pub fn generate(self) -> Report {
        let ReportInput {
            session_id,
            domain,
            difficulty,
            code_length,
            original_error_count,
            max_iterations,
            review_sufficient,
            attempts,
            started_at,
            ended_at,
        } = self.input;

        let total = original_error_count;
        let last = attempts.last();
        let identified_count = last.map_or(0, |a| a.identified_count.min(total));
        let identified_percentage = if total == 0 {
            0.0
        } else {
            f64::from(identified_count) / f64::from(total) * 100.0
        };
        let bucket = PerformanceBucket::from_counts(identified_count, total);
        let identified_problems = last.map(|a| a.identified.clone()).unwrap_or_default();
        let missed_problems = last.map(|a| a.missed.clone()).unwrap_or_default();

        let duration_seconds = u64::try_from((ended_at - started_at).num_seconds()).unwrap_or(0);
        let iterations_used = u32::try_from(attempts.len()).unwrap_or(u32::MAX);

        let recommendations = recommend(bucket, &missed_problems);

        let entries = attempts
            .into_iter()
            .map(|a| AttemptEntry {
                iteration: a.iteration,
                identified_count: a.identified_count.min(total),
                identified_percentage: a.identified_percentage,
                guidance: a.guidance,
                submitted_at: a.submitted_at,
            })
            .collect();

        Report {
            session_id,
            summary: ReportSummary {
                domain,
                difficulty,
                code_length,
                total_problems: total,
                identified_count,
                missed_count: total - identified_count,
                identified_percentage,
                bucket,
                iterations_used,
                max_iterations,
                review_sufficient,
                duration_seconds,
            },
            attempts: entries,
            identified_problems,
            missed_problems,
            recommendations,
        }
    }
}

/// Derives recommendations from the grade and the problems still missed.
fn recommend(bucket: PerformanceBucket, missed: &[String]) -> Vec<Recommendation> {
    let mut recs: Vec<Recommendation> = missed
        .iter()
        .map(|problem| Recommendation::new(1, format!("Revisit the code looking for: {problem}")))
        .collect();

    let closing = match bucket {
        PerformanceBucket::Excellent => {
            "Try a harder difficulty or a longer snippet in the next session"
        }
        PerformanceBucket::GoodProgress => {
            "Read the code line by line once more before submitting; the last few problems are usually the subtle ones"
        }
        PerformanceBucket::NeedsImprovement => {
            "Review systematically: check syntax, then logic, then Java-specific pitfalls such as null handling and string comparison"
        }
    };
    recs.push(Recommendation::new(2, closing));
    recs
}

// ============================================================================
// Tests
// ============================================================================
