//! Collaborator interfaces consumed by the controllers.
//!
//! The engine never talks to a language model or a database directly. Each
//! external capability is an async trait injected as `Arc<dyn ...>`, so the
//! same controllers run against the chat backend in production and against
//! scripted fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;
use crate::session::{CodeLength, Difficulty, ErrorSpec, ReviewAnalysis, ReviewAttempt};

/// Raw evaluation answer from the evaluation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Errors found in the code.
    #[serde(default)]
    pub found: Vec<String>,
    /// Requested errors not found.
    #[serde(default)]
    pub missing: Vec<String>,
    /// Free-form notes.
    #[serde(default)]
    pub feedback: String,
    /// Validity claimed by the service. Ignored; validity is derived from `missing`.
    #[serde(default)]
    pub valid: Option<bool>,
}

/// Raw analysis answer from the analysis service, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Known problems the learner identified.
    #[serde(default)]
    pub identified: Vec<String>,
    /// Known problems the learner missed.
    #[serde(default)]
    pub missed: Vec<String>,
    /// Identified count as claimed by the service; may be out of range.
    #[serde(default)]
    pub identified_count: i64,
    /// Total as claimed by the service; replaced during normalization.
    #[serde(default)]
    pub total_problems: i64,
}

/// Source of injectable errors.
#[async_trait]
pub trait ErrorCatalog: Send + Sync {
    /// Returns up to `count` errors from `categories` matching `difficulty`.
    async fn sample(
        &self,
        categories: &[String],
        difficulty: Difficulty,
        count: u32,
    ) -> ServiceResult<Vec<ErrorSpec>>;
}

/// Produces code containing the requested errors.
///
/// Both methods return text with two fenced code sections: the annotated
/// version and the clean version.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Generates fresh code.
    async fn generate(
        &self,
        length: CodeLength,
        difficulty: Difficulty,
        domain: &str,
        errors: &[ErrorSpec],
    ) -> ServiceResult<String>;

    /// Reworks previously generated code following a feedback prompt.
    async fn regenerate(&self, feedback_prompt: &str) -> ServiceResult<String>;
}

/// Checks generated code against the requested errors.
#[async_trait]
pub trait CodeEvaluator: Send + Sync {
    /// Evaluates annotated `code` against `requested` errors.
    async fn evaluate(&self, code: &str, requested: &[ErrorSpec])
        -> ServiceResult<EvaluationOutcome>;
}

/// Compares a learner review with the known problems.
#[async_trait]
pub trait ReviewAnalyzer: Send + Sync {
    /// Analyzes `review_text` against `known_problems` in `code`.
    async fn analyze(
        &self,
        code: &str,
        known_problems: &[String],
        review_text: &str,
    ) -> ServiceResult<AnalysisOutcome>;
}

/// Writes short hints for the learner's next attempt.
#[async_trait]
pub trait GuidanceProvider: Send + Sync {
    /// Returns guidance of a few sentences.
    async fn guide(
        &self,
        analysis: &ReviewAnalysis,
        iteration: u32,
        max_iterations: u32,
    ) -> ServiceResult<String>;
}

/// Writes the narrative comparison report.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Returns the report text.
    async fn report(
        &self,
        history: &[ReviewAttempt],
        final_analysis: &ReviewAnalysis,
    ) -> ServiceResult<String>;
}

/// The full set of collaborators an engine needs.
#[derive(Clone)]
pub struct Services {
    /// Error catalog.
    pub catalog: Arc<dyn ErrorCatalog>,
    /// Code generation service.
    pub generator: Arc<dyn CodeGenerator>,
    /// Evaluation service.
    pub evaluator: Arc<dyn CodeEvaluator>,
    /// Analysis service.
    pub analyzer: Arc<dyn ReviewAnalyzer>,
    /// Guidance service.
    pub guidance: Arc<dyn GuidanceProvider>,
    /// Report service.
    pub reporter: Arc<dyn ReportWriter>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
