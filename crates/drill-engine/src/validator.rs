//! Pre-flight validation and the JSON reconciliation boundary.
//!
//! [`build_state`] turns a loosely typed request into a session, [`validate`]
//! and [`validate_for_review`] run before the controllers, and [`reconcile`]
//! rebuilds a session from JSON that may be partial or malformed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{default_max_evaluation_attempts, default_max_iterations, Config};
use crate::error::{DrillError, Result};
use crate::session::{
    CodeLength, Difficulty, ErrorCountRange, ErrorSelection, ErrorSpec, GenerationParams,
    SessionState,
};

/// Request to start a new practice session, as received from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// `short`, `medium` or `long`, in any case.
    pub code_length: String,
    /// `easy`, `medium` or `hard`, in any case.
    pub difficulty: String,
    /// Domain; picked at random when absent or blank.
    #[serde(default)]
    pub domain: Option<String>,
    /// Lower bound of the error count.
    pub error_count_start: i64,
    /// Upper bound of the error count.
    pub error_count_end: i64,
    /// Catalog categories to sample from.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Explicit errors; takes precedence over `categories` when non-empty.
    #[serde(default)]
    pub errors: Vec<ErrorSpec>,
    /// Review iteration budget; the config value when absent.
    #[serde(default)]
    pub max_iterations: Option<i64>,
    /// Evaluation budget; the config value when absent.
    #[serde(default)]
    pub max_evaluation_attempts: Option<i64>,
}

/// Builds a new session from a request.
///
/// # Errors
///
/// Returns `DrillError::ValidationError` if the code length or difficulty is
/// unknown, the error-count range is invalid, or nothing was selected.
pub fn build_state(request: &SessionRequest, config: &Config) -> Result<SessionState> {
    let code_length: CodeLength = request.code_length.parse()?;
    let difficulty: Difficulty = request.difficulty.parse()?;

    if request.error_count_start <= 0 || request.error_count_end <= 0 {
        return Err(DrillError::validation(format!(
            "error count bounds must be positive (got {}..{})",
            request.error_count_start, request.error_count_end
        )));
    }
    if request.error_count_start > request.error_count_end {
        return Err(DrillError::validation(format!(
            "error count start {} is greater than end {}",
            request.error_count_start, request.error_count_end
        )));
    }
    let error_count = ErrorCountRange {
        start: to_u32(request.error_count_start),
        end: to_u32(request.error_count_end),
    };

    let selection = if !request.errors.is_empty() {
        ErrorSelection::Specific(request.errors.clone())
    } else if !request.categories.is_empty() {
        ErrorSelection::Categories(request.categories.clone())
    } else {
        return Err(DrillError::validation(
            "select at least one error category or provide an explicit error list",
        ));
    };

    let domain = request
        .domain
        .as_ref()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let mut state = SessionState::new(
        GenerationParams {
            code_length,
            difficulty,
            domain,
            error_count,
        },
        selection,
        budget(request.max_evaluation_attempts, config.max_evaluation_attempts),
        budget(request.max_iterations, config.max_iterations),
    );
    validate(&mut state)?;
    Ok(state)
}

/// Checks a session before any controller runs, repairing what can be repaired.
///
/// Zero budgets are reset to their defaults.
///
/// # Errors
///
/// Returns `DrillError::ValidationError` if the error-count range is invalid
/// or nothing was selected.
pub fn validate(state: &mut SessionState) -> Result<()> {
    let range = state.params.error_count;
    if range.start == 0 || range.end == 0 {
        return Err(DrillError::validation(
            "error count bounds must be positive",
        ));
    }
    if range.start > range.end {
        return Err(DrillError::validation(format!(
            "error count start {} is greater than end {}",
            range.start, range.end
        )));
    }
    if state.selection.is_empty() {
        return Err(DrillError::validation(
            "select at least one error category or provide an explicit error list",
        ));
    }

    if state.max_iterations == 0 {
        warn!(session_id = %state.id, "maxIterations was 0, using default");
        state.max_iterations = default_max_iterations();
    }
    if state.max_evaluation_attempts == 0 {
        warn!(session_id = %state.id, "maxEvaluationAttempts was 0, using default");
        state.max_evaluation_attempts = default_max_evaluation_attempts();
    }
    Ok(())
}

/// Additional checks before the review loop.
///
/// # Errors
///
/// Returns `DrillError::ValidationError` if there is no code to review or the
/// session has no error count.
pub fn validate_for_review(state: &mut SessionState) -> Result<()> {
    validate(state)?;
    if state.code_snippet.is_none() {
        return Err(DrillError::validation("no generated code to review"));
    }
    if state.original_error_count == 0 {
        return Err(DrillError::validation(
            "generated code has no recorded errors",
        ));
    }
    if state.current_iteration == 0 {
        state.current_iteration = 1;
    }
    Ok(())
}

/// Rebuilds a session from weakly typed JSON, field by field.
///
/// Every field that is absent or malformed in `raw` keeps its value from
/// `previous`. Sufficiency never goes from true to false, and the error count
/// is kept once code exists.
#[must_use]
pub fn reconcile(previous: &SessionState, raw: &Value) -> SessionState {
    let params_raw = raw.get("params").unwrap_or(&Value::Null);
    let params = GenerationParams {
        code_length: field(params_raw, "code_length").unwrap_or(previous.params.code_length),
        difficulty: field(params_raw, "difficulty").unwrap_or(previous.params.difficulty),
        domain: field(params_raw, "domain").unwrap_or_else(|| previous.params.domain.clone()),
        error_count: field(params_raw, "error_count").unwrap_or(previous.params.error_count),
    };

    let code_snippet = field(raw, "code_snippet").unwrap_or_else(|| previous.code_snippet.clone());
    let original_error_count = if previous.code_snippet.is_some() && previous.original_error_count > 0
    {
        previous.original_error_count
    } else {
        field(raw, "original_error_count").unwrap_or(previous.original_error_count)
    };

    let reconciled = SessionState {
        id: field(raw, "id").unwrap_or_else(|| previous.id.clone()),
        phase: field(raw, "phase").unwrap_or(previous.phase),
        params,
        selection: field(raw, "selection").unwrap_or_else(|| previous.selection.clone()),
        code_snippet,
        original_error_count,
        evaluation_attempts: field(raw, "evaluation_attempts")
            .unwrap_or(previous.evaluation_attempts),
        max_evaluation_attempts: field(raw, "max_evaluation_attempts")
            .unwrap_or(previous.max_evaluation_attempts),
        last_evaluation: field(raw, "last_evaluation")
            .unwrap_or_else(|| previous.last_evaluation.clone()),
        regeneration_feedback: field(raw, "regeneration_feedback")
            .unwrap_or_else(|| previous.regeneration_feedback.clone()),
        current_iteration: field(raw, "current_iteration").unwrap_or(previous.current_iteration),
        max_iterations: field(raw, "max_iterations").unwrap_or(previous.max_iterations),
        review_sufficient: previous.review_sufficient
            || field(raw, "review_sufficient").unwrap_or(false),
        review_history: field(raw, "review_history")
            .unwrap_or_else(|| previous.review_history.clone()),
        comparison_report: field(raw, "comparison_report")
            .unwrap_or_else(|| previous.comparison_report.clone()),
        error: field(raw, "error").unwrap_or_else(|| previous.error.clone()),
        started_at: field(raw, "started_at").unwrap_or(previous.started_at),
        updated_at: field(raw, "updated_at").unwrap_or(previous.updated_at),
    };

    debug!(session_id = %reconciled.id, phase = %reconciled.phase, "Session reconciled");
    reconciled
}

/// Reads `key` from `raw` as `T`, or `None` when absent or malformed.
fn field<T: DeserializeOwned>(raw: &Value, key: &str) -> Option<T> {
    let value = raw.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(field = key, error = %e, "Ignoring malformed field");
            None
        }
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Non-positive budgets fall back to the default.
fn budget(requested: Option<i64>, configured: u32) -> u32 {
    match requested {
        Some(n) if n > 0 => to_u32(n),
        Some(_) => 0,
        None => configured,
    }
}
