//! Review controller: accept a learner review, analyze it, decide whether to continue.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::default_min_review_length;
use crate::decision::{decide_review, normalize_analysis, ReviewDecision};
use crate::error::{DrillError, Result};
use crate::services::{GuidanceProvider, ReviewAnalyzer, Services};
use crate::session::{Phase, ReviewAnalysis, ReviewAttempt, SessionState};

/// Guidance longer than this many words is cut down.
const GUIDANCE_WORD_LIMIT: usize = 100;

/// Sentences kept when guidance is cut down.
const GUIDANCE_SENTENCE_LIMIT: usize = 4;

/// Drives the review loop of a session.
pub struct ReviewController {
    analyzer: Arc<dyn ReviewAnalyzer>,
    guidance: Arc<dyn GuidanceProvider>,
    min_review_length: usize,
}

impl ReviewController {
    /// Creates a controller with the default minimum review length.
    #[must_use]
    pub fn new(services: &Services) -> Self {
        Self {
            analyzer: Arc::clone(&services.analyzer),
            guidance: Arc::clone(&services.guidance),
            min_review_length: default_min_review_length(),
        }
    }

    /// Overrides the minimum trimmed review length.
    #[must_use]
    pub const fn with_min_review_length(mut self, min_review_length: usize) -> Self {
        self.min_review_length = min_review_length;
        self
    }

    /// Records the learner's review for the current iteration.
    ///
    /// Resubmitting for the same iteration overwrites the text instead of
    /// adding an entry. Moves the session to `Analyze`.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::ReviewSubmissionError` if the trimmed text is empty
    /// or shorter than the minimum length. The session is not touched.
    pub fn submit_review(&self, state: &mut SessionState, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DrillError::review_rejected("review text is empty"));
        }
        let length = trimmed.chars().count();
        if length < self.min_review_length {
            return Err(DrillError::review_rejected(format!(
                "review must be at least {} characters (got {length})",
                self.min_review_length
            )));
        }

        let iteration = state.current_iteration;
        if let Some(existing) = state
            .review_history
            .iter_mut()
            .find(|a| a.iteration == iteration)
        {
            debug!(iteration, "Overwriting review for current iteration");
            existing.review_text = text.to_string();
            existing.submitted_at = Utc::now();
        } else {
            state.review_history.push(ReviewAttempt::new(iteration, text));
            state.review_history.sort_by_key(|a| a.iteration);
        }

        state.phase = Phase::Analyze;
        state.touch();
        info!(session_id = %state.id, iteration, length, "Review submitted");
        Ok(())
    }

    /// Analyzes the review for the current iteration and decides what happens next.
    ///
    /// Never fails: an analysis service failure gives zero credit and a guidance
    /// failure gives no guidance. The iteration advances by one only when the
    /// review is insufficient and the budget allows another attempt.
    pub async fn analyze(&self, state: &mut SessionState) -> ReviewDecision {
        let iteration = state.current_iteration;
        let known_problems = state.known_problems();
        let code = state
            .code_snippet
            .as_ref()
            .map(|s| s.code.clone())
            .unwrap_or_default();
        let review_text = state
            .attempt(iteration)
            .map(|a| a.review_text.clone())
            .unwrap_or_default();

        let analysis = match self
            .analyzer
            .analyze(&code, &known_problems, &review_text)
            .await
        {
            Ok(raw) => normalize_analysis(raw, state.original_error_count),
            Err(e) => {
                warn!(session_id = %state.id, iteration, error = %e, "Analysis failed, giving zero credit");
                zero_credit(&known_problems, state.original_error_count, e.to_string())
            }
        };

        state.mark_sufficient(analysis.sufficient);
        let decision = decide_review(analysis.sufficient, iteration + 1, state.max_iterations);
        debug!(
            iteration,
            max_iterations = state.max_iterations,
            identified = analysis.identified_count,
            total = analysis.total_problems,
            sufficient = analysis.sufficient,
            ?decision,
            "Review decision"
        );

        let guidance = if !analysis.sufficient && iteration < state.max_iterations {
            self.request_guidance(&analysis, iteration, state.max_iterations)
                .await
        } else {
            None
        };

        info!(
            session_id = %state.id,
            iteration,
            identified = analysis.identified_count,
            total = analysis.total_problems,
            percentage = analysis.identified_percentage,
            sufficient = analysis.sufficient,
            "Review analyzed"
        );

        if let Some(attempt) = state
            .review_history
            .iter_mut()
            .find(|a| a.iteration == iteration)
        {
            attempt.analysis = Some(analysis.clone());
            attempt.guidance = guidance;
        }

        if !analysis.sufficient && iteration < state.max_iterations {
            state.current_iteration = iteration + 1;
        }
        if decision == ReviewDecision::Continue {
            state.phase = Phase::Review;
        }
        state.touch();
        decision
    }

    async fn request_guidance(
        &self,
        analysis: &ReviewAnalysis,
        iteration: u32,
        max_iterations: u32,
    ) -> Option<String> {
        match self.guidance.guide(analysis, iteration, max_iterations).await {
            Ok(text) if !text.trim().is_empty() => Some(condense_guidance(&text)),
            Ok(_) => None,
            Err(e) => {
                warn!(iteration, error = %e, "Guidance failed, continuing without it");
                None
            }
        }
    }
}

/// Analysis used when the analysis service fails: nothing identified.
fn zero_credit(known_problems: &[String], original_error_count: u32, failure: String) -> ReviewAnalysis {
    ReviewAnalysis {
        identified: Vec::new(),
        missed: known_problems.to_vec(),
        identified_count: 0,
        total_problems: original_error_count,
        identified_percentage: 0.0,
        sufficient: false,
        failure: Some(failure),
    }
}

/// Cuts guidance over the word limit down to its first few sentences.
fn condense_guidance(text: &str) -> String {
    let text = text.trim();
    if text.split_whitespace().count() <= GUIDANCE_WORD_LIMIT {
        return text.to_string();
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let at_boundary = matches!(ch, '.' | '!' | '?')
            && chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = idx + ch.len_utf8();
            sentences.push(text[start..end].trim());
            start = end;
            if sentences.len() == GUIDANCE_SENTENCE_LIMIT {
                break;
            }
        }
    }
    if sentences.is_empty() {
        return text.to_string();
    }
    sentences.join(" ")
}
