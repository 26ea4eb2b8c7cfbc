//! Session state types for practice sessions.
//!
//! A [`SessionState`] is the single mutable record of one practice attempt.
//! It is created in [`Phase::Generate`], mutated by the generation controller
//! until code is ready, then by the review controller once per submission, and
//! finally once by the report stage.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DrillError;

// ============================================================================
// Phase
// ============================================================================

/// Where a session is in its workflow.
///
/// The phase transitions through:
/// - `Generate` -> `Evaluate` -> `Review` (code is ready)
/// - `Review` -> `Analyze` -> `Review` (another attempt is allowed)
/// - `Analyze` -> `Report` -> `Complete`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Code has not been generated yet.
    #[default]
    Generate,
    /// Code exists and is being checked against the requested errors.
    Evaluate,
    /// Waiting for the learner's review.
    Review,
    /// A review was submitted and is being analyzed.
    Analyze,
    /// The review loop ended and the report is being written.
    Report,
    /// The session is finished.
    Complete,
}

impl Phase {
    /// Returns `true` while the generation controller owns the session.
    ///
    /// # Examples
    ///
    /// ```
    /// use drill_engine::Phase;
    ///
    /// assert!(Phase::Generate.is_generation());
    /// assert!(Phase::Evaluate.is_generation());
    /// assert!(!Phase::Review.is_generation());
    /// ```
    #[must_use]
    pub const fn is_generation(&self) -> bool {
        matches!(self, Self::Generate | Self::Evaluate)
    }

    /// Returns `true` if a learner review may be submitted in this phase.
    ///
    /// `Analyze` is accepted so a submission interrupted mid-analysis can be retried.
    #[must_use]
    pub const fn accepts_review(&self) -> bool {
        matches!(self, Self::Review | Self::Analyze)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Generate => "generate",
            Self::Evaluate => "evaluate",
            Self::Review => "review",
            Self::Analyze => "analyze",
            Self::Report => "report",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

// ============================================================================
// CodeLength and Difficulty
// ============================================================================

/// Requested size of the generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodeLength {
    /// A single short class.
    #[default]
    Short,
    /// A class with several methods.
    Medium,
    /// Several cooperating classes.
    Long,
}

impl CodeLength {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl FromStr for CodeLength {
    type Err = DrillError;

    /// Parses a code length, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(DrillError::validation(format!(
                "invalid code length '{s}': expected one of 'short', 'medium', 'long'"
            ))),
        }
    }
}

/// How subtle the injected errors are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Difficulty {
    /// Obvious errors.
    Easy,
    /// The default.
    #[default]
    Medium,
    /// Subtle errors.
    Hard,
}

impl Difficulty {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = DrillError;

    /// Parses a difficulty, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(DrillError::validation(format!(
                "invalid difficulty '{s}': expected one of 'easy', 'medium', 'hard'"
            ))),
        }
    }
}

macro_rules! lowercase_serde {
    ($ty:ty) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse::<$ty>()
                    .map_err(|e| serde::de::Error::custom(e.to_string()))
            }
        }
    };
}

lowercase_serde!(CodeLength);
lowercase_serde!(Difficulty);

// ============================================================================
// Error selection
// ============================================================================

/// One kind of defect that can be injected into generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSpec {
    /// Catalog category, e.g. "Logical".
    pub category: String,
    /// Short name, e.g. "Off-by-one".
    pub name: String,
    /// What the defect looks like.
    pub description: String,
    /// How to inject it, when the catalog provides a hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_guide: Option<String>,
}

impl ErrorSpec {
    /// Creates an error spec without an implementation guide.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            description: description.into(),
            implementation_guide: None,
        }
    }

    /// Short label used when services report found and missing errors.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} - {}", self.category, self.name)
    }

    /// Full description handed to the analysis service.
    ///
    /// # Examples
    ///
    /// ```
    /// use drill_engine::ErrorSpec;
    ///
    /// let spec = ErrorSpec::new("Logical", "Off-by-one", "Loop bound is one too high");
    /// assert_eq!(spec.known_problem(), "Logical - Off-by-one: Loop bound is one too high");
    /// ```
    #[must_use]
    pub fn known_problem(&self) -> String {
        format!("{} - {}: {}", self.category, self.name, self.description)
    }
}

/// Which errors a session should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSelection {
    /// Sample errors from these catalog categories.
    Categories(Vec<String>),
    /// Use exactly these errors.
    Specific(Vec<ErrorSpec>),
}

impl ErrorSelection {
    /// Returns `true` if nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Categories(c) => c.is_empty(),
            Self::Specific(e) => e.is_empty(),
        }
    }
}

impl Default for ErrorSelection {
    fn default() -> Self {
        Self::Categories(Vec::new())
    }
}

/// Inclusive bounds for the number of errors to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCountRange {
    /// Lower bound.
    pub start: u32,
    /// Upper bound.
    pub end: u32,
}

impl Default for ErrorCountRange {
    fn default() -> Self {
        Self { start: 2, end: 4 }
    }
}

/// What to generate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Size of the code.
    pub code_length: CodeLength,
    /// How subtle the errors are.
    pub difficulty: Difficulty,
    /// Domain the code is set in; picked at random when unset.
    #[serde(default)]
    pub domain: Option<String>,
    /// How many errors to inject when sampling from categories.
    pub error_count: ErrorCountRange,
}

// ============================================================================
// Generated code and results
// ============================================================================

/// Generated code in its two renditions.
///
/// Replaced wholesale on regeneration, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    /// Code with comments marking each injected error.
    pub code: String,
    /// The same code without the markers, as shown to the learner.
    pub clean_code: String,
    /// The errors generation was asked to inject.
    pub raw_errors: Vec<ErrorSpec>,
    /// How many errors were requested.
    pub expected_error_count: u32,
}

/// Outcome of checking generated code against the requested errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Errors the evaluator found in the code.
    pub found: Vec<String>,
    /// Requested errors the evaluator could not find.
    pub missing: Vec<String>,
    /// Free-form evaluator notes.
    pub feedback: String,
    /// `true` when nothing is missing.
    pub valid: bool,
}

/// Normalized analysis of one review attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    /// Known problems the learner identified.
    pub identified: Vec<String>,
    /// Known problems the learner missed.
    pub missed: Vec<String>,
    /// Identified count, never above `total_problems`.
    pub identified_count: u32,
    /// Always the session's original error count.
    pub total_problems: u32,
    /// `identified_count / total_problems * 100`.
    pub identified_percentage: f64,
    /// Whether the review was good enough to stop.
    pub sufficient: bool,
    /// Set when the analysis service failed and zero credit was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// One learner submission and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAttempt {
    /// Iteration the review was submitted for (1-indexed).
    pub iteration: u32,
    /// The learner's text as submitted.
    pub review_text: String,
    /// Analysis of the text, once available.
    #[serde(default)]
    pub analysis: Option<ReviewAnalysis>,
    /// Guidance for the next attempt.
    #[serde(default)]
    pub guidance: Option<String>,
    /// When the text was (last) submitted.
    pub submitted_at: DateTime<Utc>,
}

impl ReviewAttempt {
    /// Creates an unanalyzed attempt stamped with the current time.
    #[must_use]
    pub fn new(iteration: u32, review_text: impl Into<String>) -> Self {
        Self {
            iteration,
            review_text: review_text.into(),
            analysis: None,
            guidance: None,
            submitted_at: Utc::now(),
        }
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Complete state of one practice session.
///
/// Serializable to JSON for the HTTP API and for the terminal session's state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Session identifier (UUID v4).
    pub id: String,

    /// Current workflow phase.
    pub phase: Phase,

    /// What to generate.
    pub params: GenerationParams,

    /// Which errors to inject.
    pub selection: ErrorSelection,

    /// Generated code, once generation succeeded.
    #[serde(default)]
    pub code_snippet: Option<CodeSnippet>,

    /// Number of injected errors; the denominator for every percentage.
    #[serde(default)]
    pub original_error_count: u32,

    /// Evaluation calls made for the current code.
    #[serde(default)]
    pub evaluation_attempts: u32,

    /// Evaluation budget.
    pub max_evaluation_attempts: u32,

    /// Result of the latest evaluation.
    #[serde(default)]
    pub last_evaluation: Option<EvaluationResult>,

    /// Prompt for the next regeneration, when one is due.
    #[serde(default)]
    pub regeneration_feedback: Option<String>,

    /// Iteration the next review is submitted for (1-indexed).
    #[serde(default)]
    pub current_iteration: u32,

    /// Review iteration budget.
    pub max_iterations: u32,

    /// Set once a review is sufficient; never cleared.
    #[serde(default)]
    pub review_sufficient: bool,

    /// Submitted reviews in iteration order, at most one per iteration.
    #[serde(default)]
    pub review_history: Vec<ReviewAttempt>,

    /// Final comparison report.
    #[serde(default)]
    pub comparison_report: Option<String>,

    /// Message from the last terminal failure.
    #[serde(default)]
    pub error: Option<String>,

    /// When the session was created.
    pub started_at: DateTime<Utc>,

    /// When the state was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(GenerationParams::default(), ErrorSelection::default(), 3, 3)
    }
}

impl SessionState {
    /// Creates a new session in the `Generate` phase.
    ///
    /// # Examples
    ///
    /// ```
    /// use drill_engine::{ErrorSelection, GenerationParams, Phase, SessionState};
    ///
    /// let state = SessionState::new(
    ///     GenerationParams::default(),
    ///     ErrorSelection::Categories(vec!["Logical".to_string()]),
    ///     3,
    ///     3,
    /// );
    /// assert_eq!(state.phase, Phase::Generate);
    /// assert_eq!(state.current_iteration, 1);
    /// assert!(state.code_snippet.is_none());
    /// ```
    #[must_use]
    pub fn new(
        params: GenerationParams,
        selection: ErrorSelection,
        max_evaluation_attempts: u32,
        max_iterations: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            phase: Phase::Generate,
            params,
            selection,
            code_snippet: None,
            original_error_count: 0,
            evaluation_attempts: 0,
            max_evaluation_attempts,
            last_evaluation: None,
            regeneration_feedback: None,
            current_iteration: 1,
            max_iterations,
            review_sufficient: false,
            review_history: Vec::new(),
            comparison_report: None,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Replaces this session with a fresh one using the same parameters and budgets.
    ///
    /// The id is kept so the session stays addressable; nothing else carries over.
    pub fn reset(&mut self) {
        let id = std::mem::take(&mut self.id);
        *self = Self::new(
            self.params.clone(),
            self.selection.clone(),
            self.max_evaluation_attempts,
            self.max_iterations,
        );
        self.id = id;
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns `true` once the report has been produced.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Known problems built from the original error manifest.
    #[must_use]
    pub fn known_problems(&self) -> Vec<String> {
        self.code_snippet
            .as_ref()
            .map(|s| s.raw_errors.iter().map(ErrorSpec::known_problem).collect())
            .unwrap_or_default()
    }

    /// Returns the attempt recorded for `iteration`, if any.
    #[must_use]
    pub fn attempt(&self, iteration: u32) -> Option<&ReviewAttempt> {
        self.review_history.iter().find(|a| a.iteration == iteration)
    }

    /// Returns the most recent analysis.
    #[must_use]
    pub fn latest_analysis(&self) -> Option<&ReviewAnalysis> {
        self.review_history
            .iter()
            .rev()
            .find_map(|a| a.analysis.as_ref())
    }

    /// Records sufficiency without ever clearing it.
    pub fn mark_sufficient(&mut self, sufficient: bool) {
        self.review_sufficient |= sufficient;
    }

    /// Returns the duration since the session started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

// ============================================================================
// Tests
// ============================================================================
