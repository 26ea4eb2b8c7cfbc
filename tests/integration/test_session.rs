//! End-to-end practice sessions against scripted collaborators.
//!
//! Every collaborator answers from a queue, so each test states exactly what
//! the language model "said" and checks how the session reacted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use drill_engine::{
    AnalysisOutcome, CodeEvaluator, CodeGenerator, CodeLength, Config, Difficulty, DrillError,
    Engine, ErrorCatalog, ErrorSelection, ErrorSpec, EvaluationOutcome, GenerationParams,
    GuidanceProvider, HandleSettings, Phase, ReportWriter, ReviewAnalysis, ReviewAnalyzer,
    ReviewAttempt, ServiceError, ServiceResult, Services, SessionRegistry, SessionState,
};

const REVIEW: &str = "The loop in process() runs one step too far";

/// Annotated and clean renditions tagged with `marker`.
fn code(marker: &str) -> String {
    format!(
        "```java-annotated\nclass {marker} {{ int x; // ERROR: Logical - Error 0\n}}\n```\n\
         ```java-clean\nclass {marker} {{ int x;\n}}\n```"
    )
}

fn evaluation(found: usize, missing: usize) -> EvaluationOutcome {
    EvaluationOutcome {
        found: (0..found).map(|i| format!("Logical - Error {i}")).collect(),
        missing: (found..found + missing)
            .map(|i| format!("Logical - Error {i}"))
            .collect(),
        feedback: String::new(),
        valid: None,
    }
}

fn analysis(identified: i64) -> AnalysisOutcome {
    AnalysisOutcome {
        identified_count: identified,
        ..AnalysisOutcome::default()
    }
}

fn pop<T>(queue: &Mutex<VecDeque<ServiceResult<T>>>) -> ServiceResult<T> {
    queue
        .lock()
        .expect("script lock")
        .pop_front()
        .unwrap_or_else(|| Err(ServiceError::unavailable("script exhausted")))
}

/// Collaborators that answer from queues and count their calls.
#[derive(Default)]
struct Script {
    regenerations: Mutex<VecDeque<ServiceResult<String>>>,
    evaluations: Mutex<VecDeque<ServiceResult<EvaluationOutcome>>>,
    analyses: Mutex<VecDeque<ServiceResult<AnalysisOutcome>>>,
    reports: Mutex<VecDeque<ServiceResult<String>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl Script {
    fn record(&self, call: &'static str) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    fn regenerate_with(self, reply: ServiceResult<String>) -> Self {
        self.regenerations.lock().expect("lock").push_back(reply);
        self
    }

    fn evaluate_with(self, reply: ServiceResult<EvaluationOutcome>) -> Self {
        self.evaluations.lock().expect("lock").push_back(reply);
        self
    }

    fn analyze_with(self, reply: ServiceResult<AnalysisOutcome>) -> Self {
        self.analyses.lock().expect("lock").push_back(reply);
        self
    }

    fn report_with(self, reply: ServiceResult<String>) -> Self {
        self.reports.lock().expect("lock").push_back(reply);
        self
    }
}

#[async_trait]
impl ErrorCatalog for Script {
    async fn sample(&self, _: &[String], _: Difficulty, count: u32) -> ServiceResult<Vec<ErrorSpec>> {
        self.record("sample");
        Ok((0..count)
            .map(|i| ErrorSpec::new("Logical", format!("Error {i}"), "Subtle logic slip"))
            .collect())
    }
}

#[async_trait]
impl CodeGenerator for Script {
    async fn generate(
        &self,
        _: CodeLength,
        _: Difficulty,
        _: &str,
        _: &[ErrorSpec],
    ) -> ServiceResult<String> {
        self.record("generate");
        Ok(code("First"))
    }

    async fn regenerate(&self, _: &str) -> ServiceResult<String> {
        self.record("regenerate");
        pop(&self.regenerations)
    }
}

#[async_trait]
impl CodeEvaluator for Script {
    async fn evaluate(&self, _: &str, _: &[ErrorSpec]) -> ServiceResult<EvaluationOutcome> {
        self.record("evaluate");
        pop(&self.evaluations)
    }
}

#[async_trait]
impl ReviewAnalyzer for Script {
    async fn analyze(&self, _: &str, _: &[String], _: &str) -> ServiceResult<AnalysisOutcome> {
        self.record("analyze");
        pop(&self.analyses)
    }
}

#[async_trait]
impl GuidanceProvider for Script {
    async fn guide(&self, _: &ReviewAnalysis, iteration: u32, _: u32) -> ServiceResult<String> {
        self.record("guide");
        Ok(format!("Hint for attempt {}.", iteration + 1))
    }
}

#[async_trait]
impl ReportWriter for Script {
    async fn report(&self, _: &[ReviewAttempt], _: &ReviewAnalysis) -> ServiceResult<String> {
        self.record("report");
        pop(&self.reports)
    }
}

fn engine(script: &Arc<Script>) -> Engine {
    let services = Services {
        catalog: script.clone(),
        generator: script.clone(),
        evaluator: script.clone(),
        analyzer: script.clone(),
        guidance: script.clone(),
        reporter: script.clone(),
    };
    Engine::new(&services, &Config::default()).with_seed(42)
}

fn session(errors: u32, max_evaluation_attempts: u32, max_iterations: u32) -> SessionState {
    let mut params = GenerationParams::default();
    params.error_count.start = errors;
    params.error_count.end = errors;
    SessionState::new(
        params,
        ErrorSelection::Categories(vec!["Logical".to_string()]),
        max_evaluation_attempts,
        max_iterations,
    )
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_single_evaluation_budget_accepts_incomplete_code() {
    let script = Arc::new(Script::default().evaluate_with(Ok(evaluation(1, 1))));
    let engine = engine(&script);

    let state = engine.run_generation(session(2, 1, 3)).await;

    assert_eq!(state.phase, Phase::Review);
    assert_eq!(state.evaluation_attempts, 1);
    assert_eq!(state.original_error_count, 2);
    assert!(!state.last_evaluation.as_ref().expect("evaluated").valid);
    assert_eq!(script.count("regenerate"), 0);
}

#[tokio::test]
async fn test_regeneration_until_valid() {
    let script = Arc::new(
        Script::default()
            .evaluate_with(Ok(evaluation(1, 1)))
            .regenerate_with(Ok(code("Second")))
            .evaluate_with(Ok(evaluation(2, 0))),
    );
    let engine = engine(&script);

    let state = engine.run_generation(session(2, 3, 3)).await;

    assert_eq!(state.phase, Phase::Review);
    assert_eq!(state.evaluation_attempts, 2);
    assert_eq!(script.count("regenerate"), 1);
    let snippet = state.code_snippet.expect("code");
    assert!(snippet.clean_code.contains("class Second"));
    assert_eq!(snippet.raw_errors.len(), 2);
    assert!(state.regeneration_feedback.is_none());
}

#[tokio::test]
async fn test_three_attempts_allow_two_regenerations() {
    let script = Arc::new(
        Script::default()
            .evaluate_with(Ok(evaluation(0, 2)))
            .regenerate_with(Ok(code("Second")))
            .evaluate_with(Ok(evaluation(1, 1)))
            .regenerate_with(Ok(code("Third")))
            .evaluate_with(Ok(evaluation(1, 1))),
    );
    let engine = engine(&script);

    let state = engine.run_generation(session(2, 3, 3)).await;

    assert_eq!(script.count("evaluate"), 3);
    assert_eq!(script.count("regenerate"), 2);
    assert_eq!(state.evaluation_attempts, state.max_evaluation_attempts);
    assert_eq!(state.phase, Phase::Review);
}

#[tokio::test]
async fn test_failed_regeneration_keeps_previous_code() {
    let script = Arc::new(
        Script::default()
            .evaluate_with(Ok(evaluation(1, 1)))
            .regenerate_with(Err(ServiceError::unavailable("model overloaded")))
            .evaluate_with(Ok(evaluation(1, 1)))
            .regenerate_with(Ok("no code blocks here".to_string()))
            .evaluate_with(Ok(evaluation(1, 1))),
    );
    let engine = engine(&script);

    let state = engine.run_generation(session(2, 3, 3)).await;

    let snippet = state.code_snippet.expect("code kept");
    assert!(snippet.clean_code.contains("class First"));
    assert_eq!(state.phase, Phase::Review);
}

#[tokio::test]
async fn test_evaluation_outage_consumes_attempts() {
    let script = Arc::new(Script::default());
    let engine = engine(&script);

    let state = engine.run_generation(session(2, 2, 3)).await;

    assert_eq!(state.evaluation_attempts, 2);
    assert_eq!(state.phase, Phase::Review);
    let last = state.last_evaluation.expect("evaluated");
    assert!(last.missing[0].contains("Evaluation unavailable"));
}

// ============================================================================
// Review
// ============================================================================

/// A session that has finished generation with `errors` injected errors.
async fn ready(script: &Arc<Script>, errors: u32, max_iterations: u32) -> SessionState {
    script
        .evaluations
        .lock()
        .expect("lock")
        .push_front(Ok(evaluation(errors as usize, 0)));
    let state = engine(script)
        .run_generation(session(errors, 3, max_iterations))
        .await;
    assert_eq!(state.phase, Phase::Review);
    state
}

#[tokio::test]
async fn test_all_problems_found_is_sufficient() {
    let script = Arc::new(
        Script::default()
            .analyze_with(Ok(analysis(5)))
            .report_with(Ok("Well done.".to_string())),
    );
    let state = ready(&script, 5, 3).await;

    let state = engine(&script).run_review(state, REVIEW).await;

    assert!(state.review_sufficient);
    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.current_iteration, 1);
    assert_eq!(state.comparison_report.as_deref(), Some("Well done."));
    assert_eq!(script.count("guide"), 0);
}

#[tokio::test]
async fn test_ninety_percent_is_sufficient() {
    let script = Arc::new(
        Script::default()
            .analyze_with(Ok(analysis(9)))
            .report_with(Ok("Nearly perfect.".to_string())),
    );
    let state = ready(&script, 10, 3).await;

    let state = engine(&script).run_review(state, REVIEW).await;

    let analysis = state.latest_analysis().expect("analyzed");
    assert!((analysis.identified_percentage - 90.0).abs() < f64::EPSILON);
    assert!(analysis.sufficient);
    assert_eq!(state.phase, Phase::Complete);
}

#[tokio::test]
async fn test_budget_exhaustion_without_sufficiency() {
    let script = Arc::new(
        Script::default()
            .analyze_with(Ok(analysis(6)))
            .analyze_with(Ok(analysis(7)))
            .analyze_with(Ok(analysis(8)))
            .report_with(Ok("Keep practicing.".to_string())),
    );
    let mut state = ready(&script, 10, 3).await;
    let engine = engine(&script);

    for expected_next in [2, 3] {
        state = engine.run_review(state, REVIEW).await;
        assert_eq!(state.phase, Phase::Review);
        assert_eq!(state.current_iteration, expected_next);
    }

    state = engine.run_review(state, REVIEW).await;

    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.current_iteration, 3);
    assert!(!state.review_sufficient);
    assert_eq!(state.review_history.len(), 3);
    assert_eq!(script.count("guide"), 2);
    let guidance: Vec<_> = state
        .review_history
        .iter()
        .map(|a| a.guidance.is_some())
        .collect();
    assert_eq!(guidance, vec![true, true, false]);
}

#[tokio::test]
async fn test_empty_review_rejected_without_mutation() {
    let script = Arc::new(Script::default());
    let state = ready(&script, 2, 3).await;

    let after = engine(&script).run_review(state.clone(), "").await;

    assert!(after
        .error
        .as_deref()
        .expect("error recorded")
        .contains("Review rejected"));
    assert_eq!(after.current_iteration, state.current_iteration);
    assert_eq!(after.review_history, state.review_history);
    assert_eq!(script.count("analyze"), 0);
}

#[tokio::test]
async fn test_analysis_outage_gives_zero_credit() {
    let script = Arc::new(Script::default());
    let state = ready(&script, 4, 3).await;

    let state = engine(&script).run_review(state, REVIEW).await;

    let attempt = state.attempt(1).expect("attempt recorded");
    let analysis = attempt.analysis.as_ref().expect("analysis stored");
    assert_eq!(analysis.identified_count, 0);
    assert_eq!(analysis.total_problems, 4);
    assert!(analysis.failure.is_some());
    assert_eq!(state.current_iteration, 2);
    assert_eq!(state.phase, Phase::Review);
}

#[tokio::test]
async fn test_inflated_counts_are_clamped() {
    let script = Arc::new(
        Script::default()
            .analyze_with(Ok(AnalysisOutcome {
                identified_count: 12,
                total_problems: 12,
                ..AnalysisOutcome::default()
            }))
            .report_with(Ok("Report".to_string())),
    );
    let state = ready(&script, 10, 3).await;

    let state = engine(&script).run_review(state, REVIEW).await;

    let analysis = state.latest_analysis().expect("analyzed");
    assert_eq!(analysis.identified_count, 10);
    assert_eq!(analysis.total_problems, 10);
    assert!((analysis.identified_percentage - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_report_outage_falls_back_to_local_report() {
    let script = Arc::new(Script::default().analyze_with(Ok(analysis(2))));
    let state = ready(&script, 2, 3).await;

    let state = engine(&script).run_review(state, REVIEW).await;

    let report = state.comparison_report.expect("report written");
    assert!(report.contains("# CodeDrill Review Report"));
    assert!(report.contains("| Performance | Excellent |"));
    assert_eq!(state.phase, Phase::Complete);
}

#[tokio::test]
async fn test_review_after_completion_is_rejected() {
    let script = Arc::new(
        Script::default()
            .analyze_with(Ok(analysis(2)))
            .report_with(Ok("Done".to_string())),
    );
    let state = ready(&script, 2, 3).await;
    let engine = engine(&script);
    let state = engine.run_review(state, REVIEW).await;

    let err = engine
        .review(state, "Another review after completion")
        .await
        .expect_err("completed sessions take no reviews");
    assert!(matches!(err, DrillError::InvalidPhase { .. }));
    assert_eq!(script.count("report"), 1);
}

// ============================================================================
// Session layer
// ============================================================================

#[tokio::test]
async fn test_handle_serializes_and_deduplicates() {
    let script = Arc::new(
        Script::default()
            .evaluate_with(Ok(evaluation(3, 0)))
            .analyze_with(Ok(analysis(1)))
            .analyze_with(Ok(analysis(3)))
            .report_with(Ok("Finished".to_string())),
    );
    let registry = SessionRegistry::new(
        Arc::new(engine(&script)),
        HandleSettings {
            lock_timeout: Duration::from_secs(5),
            duplicate_window: Duration::from_secs(10),
        },
    );
    let handle = registry.insert(session(3, 3, 3)).await;

    handle.generate().await.expect("generation");

    let first = handle.submit_review(REVIEW, Some(1)).await.expect("first review");
    assert_eq!(first.current_iteration, 2);

    // Same text for the same iteration inside the window
    let repeat = handle.submit_review(REVIEW, Some(1)).await.expect("duplicate");
    assert_eq!(repeat.review_history.len(), 1);
    assert_eq!(script.count("analyze"), 1);

    let stale = handle
        .submit_review("A changed review for the first round", Some(1))
        .await
        .expect_err("stale iteration");
    assert!(matches!(stale, DrillError::StaleSubmission { .. }));

    let done = handle
        .submit_review("All three problems are in process()", Some(2))
        .await
        .expect("second review");
    assert_eq!(done.phase, Phase::Complete);
    assert!(done.review_sufficient);

    let snapshot = registry
        .get(handle.id())
        .await
        .expect("registered")
        .snapshot()
        .await;
    assert_eq!(snapshot, done);
}

#[tokio::test]
async fn test_sufficiency_survives_reconciliation() {
    let script = Arc::new(
        Script::default()
            .analyze_with(Ok(analysis(2)))
            .report_with(Ok("Done".to_string())),
    );
    let state = ready(&script, 2, 3).await;
    let state = engine(&script).run_review(state, REVIEW).await;
    assert!(state.review_sufficient);

    let raw = serde_json::json!({ "review_sufficient": false, "original_error_count": 7 });
    let reconciled = drill_engine::reconcile(&state, &raw);

    assert!(reconciled.review_sufficient);
    assert_eq!(reconciled.original_error_count, 2);
}
