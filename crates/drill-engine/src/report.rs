//! Report stage: one-shot, idempotent finalization of a session.

use std::sync::Arc;

use chrono::Utc;
use drill_report::{AttemptInput, MarkdownGenerator, ReportGenerator, ReportInput};
use tracing::{debug, info, warn};

use crate::services::{ReportWriter, Services};
use crate::session::{Phase, ReviewAnalysis, SessionState};

/// Writes the comparison report once the review loop has ended.
pub struct ReportStage {
    reporter: Arc<dyn ReportWriter>,
}

impl ReportStage {
    /// Creates a report stage using the report service from `services`.
    #[must_use]
    pub fn new(services: &Services) -> Self {
        Self {
            reporter: Arc::clone(&services.reporter),
        }
    }

    /// Produces the comparison report and completes the session.
    ///
    /// Does nothing beyond marking the session complete if a report already
    /// exists. Falls back to a locally rendered report if the report service
    /// fails or returns nothing.
    pub async fn finalize(&self, state: &mut SessionState) {
        if state.comparison_report.is_some() {
            debug!(session_id = %state.id, "Report already written");
            state.phase = Phase::Complete;
            return;
        }

        state.phase = Phase::Report;
        let final_analysis = state
            .latest_analysis()
            .cloned()
            .unwrap_or_else(|| ReviewAnalysis {
                total_problems: state.original_error_count,
                ..ReviewAnalysis::default()
            });

        let report = match self
            .reporter
            .report(&state.review_history, &final_analysis)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(session_id = %state.id, "Report service returned nothing, using fallback report");
                fallback_report(state)
            }
            Err(e) => {
                warn!(session_id = %state.id, error = %e, "Report service failed, using fallback report");
                fallback_report(state)
            }
        };

        state.comparison_report = Some(report);
        state.phase = Phase::Complete;
        state.touch();
        info!(
            session_id = %state.id,
            sufficient = state.review_sufficient,
            iterations = state.review_history.len(),
            "Session complete"
        );
    }
}

/// Collects what the session knows into report input.
#[must_use]
pub fn report_input(state: &SessionState) -> ReportInput {
    let attempts = state
        .review_history
        .iter()
        .filter_map(|attempt| {
            let analysis = attempt.analysis.as_ref()?;
            Some(AttemptInput {
                iteration: attempt.iteration,
                identified: analysis.identified.clone(),
                missed: analysis.missed.clone(),
                identified_count: analysis.identified_count,
                identified_percentage: analysis.identified_percentage,
                guidance: attempt.guidance.clone(),
                submitted_at: attempt.submitted_at,
            })
        })
        .collect();

    ReportInput {
        session_id: state.id.clone(),
        domain: state.params.domain.clone().unwrap_or_default(),
        difficulty: state.params.difficulty.to_string(),
        code_length: state.params.code_length.to_string(),
        original_error_count: state.original_error_count,
        max_iterations: state.max_iterations,
        review_sufficient: state.review_sufficient,
        attempts,
        started_at: state.started_at,
        ended_at: Utc::now(),
    }
}

/// Deterministic Markdown report built only from local counts.
#[must_use]
pub fn fallback_report(state: &SessionState) -> String {
    let report = ReportGenerator::new(report_input(state)).generate();
    MarkdownGenerator::new(&report).generate()
}
