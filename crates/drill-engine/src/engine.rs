//! Engine entry points tying the controllers together.
//!
//! Each entry point works on an owned copy of the session and hands back the
//! result only when the call completes, so an abandoned call never leaves a
//! half-applied state behind.

use tracing::{error, info, warn};

use crate::config::Config;
use crate::decision::ReviewDecision;
use crate::error::{DrillError, Result};
use crate::generation::GenerationController;
use crate::report::ReportStage;
use crate::review::ReviewController;
use crate::services::Services;
use crate::session::SessionState;
use crate::validator::{validate, validate_for_review};

/// Runs practice sessions against a set of collaborators.
pub struct Engine {
    generation: GenerationController,
    review: ReviewController,
    report: ReportStage,
}

impl Engine {
    /// Creates an engine using `services`, with budgets and pools from `config`.
    #[must_use]
    pub fn new(services: &Services, config: &Config) -> Self {
        Self {
            generation: GenerationController::new(services, config.domains.clone()),
            review: ReviewController::new(services)
                .with_min_review_length(config.min_review_length),
            report: ReportStage::new(services),
        }
    }

    /// Makes random choices during generation reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.generation = self.generation.with_seed(seed);
        self
    }

    /// Runs the generation loop and returns the updated session.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::ValidationError` or `DrillError::GenerationFailure`;
    /// the input session is then still the latest valid state.
    pub async fn generate(&self, mut state: SessionState) -> Result<SessionState> {
        state.error = None;
        if !state.phase.is_generation() {
            return Err(DrillError::invalid_phase("generate code", state.phase));
        }
        validate(&mut state)?;
        self.generation.run(&mut state).await?;
        Ok(state)
    }

    /// Submits and analyzes one review, finalizing the session when the loop ends.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::ReviewSubmissionError` for empty or short text,
    /// `DrillError::InvalidPhase` outside the review loop, and
    /// `DrillError::ValidationError` if the session cannot be reviewed.
    pub async fn review(&self, mut state: SessionState, text: &str) -> Result<SessionState> {
        state.error = None;
        if !state.phase.accepts_review() {
            return Err(DrillError::invalid_phase("submit a review", state.phase));
        }
        validate_for_review(&mut state)?;
        self.review.submit_review(&mut state, text)?;

        if self.review.analyze(&mut state).await == ReviewDecision::Complete {
            self.report.finalize(&mut state).await;
        }
        Ok(state)
    }

    /// Total variant of [`Engine::generate`]: failures are recorded on the session.
    pub async fn run_generation(&self, state: SessionState) -> SessionState {
        match self.generate(state.clone()).await {
            Ok(next) => next,
            Err(e) => record_failure(state, &e),
        }
    }

    /// Total variant of [`Engine::review`]: failures are recorded on the session.
    pub async fn run_review(&self, state: SessionState, text: &str) -> SessionState {
        match self.review(state.clone(), text).await {
            Ok(next) => next,
            Err(e) => record_failure(state, &e),
        }
    }
}

/// Attaches the failure message to the untouched input session.
fn record_failure(mut state: SessionState, err: &DrillError) -> SessionState {
    if err.is_terminal() {
        error!(session_id = %state.id, error = %err, "Session step failed");
    } else {
        warn!(session_id = %state.id, error = %err, "Session step rejected");
    }
    state.error = Some(err.to_string());
    state.touch();
    info!(session_id = %state.id, phase = %state.phase, "Session left unchanged");
    state
}
