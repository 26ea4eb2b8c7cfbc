//! Code generation controller: generate, evaluate, and regenerate while errors are missing.

use std::fmt::Write;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_DOMAINS;
use crate::decision::{decide_generation, GenerationDecision};
use crate::error::{DrillError, Result};
use crate::extract::extract_code_pair;
use crate::services::{CodeEvaluator, CodeGenerator, ErrorCatalog, EvaluationOutcome, Services};
use crate::session::{
    CodeSnippet, ErrorCountRange, ErrorSelection, ErrorSpec, EvaluationResult, Phase, SessionState,
};

/// Drives a session from `Generate` to `Review`.
pub struct GenerationController {
    catalog: Arc<dyn ErrorCatalog>,
    generator: Arc<dyn CodeGenerator>,
    evaluator: Arc<dyn CodeEvaluator>,
    domains: Vec<String>,
    rng: Mutex<StdRng>,
}

impl GenerationController {
    /// Creates a controller that picks domains from `domains`.
    ///
    /// An empty pool falls back to the built-in domain list.
    #[must_use]
    pub fn new(services: &Services, domains: Vec<String>) -> Self {
        let domains = if domains.is_empty() {
            DEFAULT_DOMAINS.iter().map(ToString::to_string).collect()
        } else {
            domains
        };
        Self {
            catalog: Arc::clone(&services.catalog),
            generator: Arc::clone(&services.generator),
            evaluator: Arc::clone(&services.evaluator),
            domains,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Makes domain and error-count sampling reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Runs the whole generation loop.
    ///
    /// Starts from scratch in `Generate`, or resumes evaluation when the
    /// session already holds code. Ends in `Review` unless generation failed.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::GenerationFailure` if the catalog or generator
    /// fails, or the generator output has no usable code.
    pub async fn run(&self, state: &mut SessionState) -> Result<()> {
        if state.phase == Phase::Generate || state.code_snippet.is_none() {
            self.generate(state).await?;
        } else if state.evaluation_attempts >= state.max_evaluation_attempts {
            debug!(
                session_id = %state.id,
                attempts = state.evaluation_attempts,
                max_attempts = state.max_evaluation_attempts,
                "Evaluation budget already spent, accepting code as is"
            );
        }

        while state.evaluation_attempts < state.max_evaluation_attempts {
            self.evaluate(state).await;

            let (valid, missing_count) = state
                .last_evaluation
                .as_ref()
                .map_or((false, 0), |e| (e.valid, e.missing.len()));
            let decision = decide_generation(
                state.evaluation_attempts,
                state.max_evaluation_attempts,
                valid,
                missing_count,
            );
            debug!(
                attempts = state.evaluation_attempts,
                max_attempts = state.max_evaluation_attempts,
                valid,
                missing_count,
                ?decision,
                "Generation decision"
            );

            match decision {
                GenerationDecision::Regenerate => self.regenerate(state).await,
                GenerationDecision::Complete => break,
            }
        }

        state.regeneration_feedback = None;
        state.phase = Phase::Review;
        if state.current_iteration == 0 {
            state.current_iteration = 1;
        }
        state.touch();
        info!(
            session_id = %state.id,
            error_count = state.original_error_count,
            attempts = state.evaluation_attempts,
            "Code ready for review"
        );
        Ok(())
    }

    /// Generates fresh code and moves the session to `Evaluate`.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::GenerationFailure` on any catalog, generator or parsing failure.
    pub async fn generate(&self, state: &mut SessionState) -> Result<()> {
        let domain = match &state.params.domain {
            Some(domain) => domain.clone(),
            None => {
                let picked = self.pick_domain();
                state.params.domain = Some(picked.clone());
                picked
            }
        };

        let errors = self.resolve_errors(state).await?;
        if errors.is_empty() {
            return Err(DrillError::generation(
                "no errors available for the selected categories and difficulty",
            ));
        }
        let count = u32::try_from(errors.len()).unwrap_or(u32::MAX);

        info!(
            session_id = %state.id,
            domain = %domain,
            length = %state.params.code_length,
            difficulty = %state.params.difficulty,
            error_count = count,
            "Generating code"
        );

        let text = self
            .generator
            .generate(
                state.params.code_length,
                state.params.difficulty,
                &domain,
                &errors,
            )
            .await
            .map_err(|e| DrillError::generation(format!("generation service failed: {e}")))?;

        let pair = extract_code_pair(&text).ok_or_else(|| {
            DrillError::generation("generated text did not contain annotated and clean code")
        })?;

        state.code_snippet = Some(CodeSnippet {
            code: pair.annotated,
            clean_code: pair.clean,
            raw_errors: errors,
            expected_error_count: count,
        });
        state.original_error_count = count;
        state.evaluation_attempts = 0;
        state.last_evaluation = None;
        state.regeneration_feedback = None;
        state.phase = Phase::Evaluate;
        state.touch();
        Ok(())
    }

    /// Evaluates the current code. Never fails; service errors become a failed evaluation.
    pub async fn evaluate(&self, state: &mut SessionState) {
        let Some(snippet) = state.code_snippet.as_ref() else {
            warn!(session_id = %state.id, "Evaluate called without code");
            return;
        };

        let outcome = match self
            .evaluator
            .evaluate(&snippet.code, &snippet.raw_errors)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session_id = %state.id, error = %e, "Evaluation failed, treating code as incomplete");
                EvaluationOutcome {
                    found: Vec::new(),
                    missing: vec![format!("Evaluation unavailable: {e}")],
                    feedback: String::new(),
                    valid: None,
                }
            }
        };

        state.evaluation_attempts += 1;

        let valid = outcome.missing.is_empty();
        if outcome.valid.is_some_and(|claimed| claimed != valid) {
            debug!(claimed = ?outcome.valid, derived = valid, "Ignoring evaluator validity flag");
        }

        state.regeneration_feedback =
            if !valid && state.evaluation_attempts < state.max_evaluation_attempts {
                Some(regeneration_prompt(snippet, &outcome.found, &outcome.missing))
            } else {
                None
            };

        info!(
            session_id = %state.id,
            attempt = state.evaluation_attempts,
            found = outcome.found.len(),
            missing = outcome.missing.len(),
            valid,
            "Evaluation finished"
        );

        state.last_evaluation = Some(EvaluationResult {
            found: outcome.found,
            missing: outcome.missing,
            feedback: outcome.feedback,
            valid,
        });
        state.touch();
    }

    /// Asks the generator to add the missing errors.
    ///
    /// On any failure the previous code is kept.
    pub async fn regenerate(&self, state: &mut SessionState) {
        let Some(feedback) = state.regeneration_feedback.clone() else {
            debug!(session_id = %state.id, "No regeneration feedback, skipping");
            return;
        };
        let Some(previous) = state.code_snippet.as_ref() else {
            return;
        };

        let text = match self.generator.regenerate(&feedback).await {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %state.id, error = %e, "Regeneration failed, keeping previous code");
                return;
            }
        };

        let Some(pair) = extract_code_pair(&text) else {
            warn!(session_id = %state.id, "Regenerated text had no usable code, keeping previous code");
            return;
        };

        info!(session_id = %state.id, "Code regenerated");
        state.code_snippet = Some(CodeSnippet {
            code: pair.annotated,
            clean_code: pair.clean,
            raw_errors: previous.raw_errors.clone(),
            expected_error_count: previous.expected_error_count,
        });
        state.touch();
    }

    async fn resolve_errors(&self, state: &SessionState) -> Result<Vec<ErrorSpec>> {
        match &state.selection {
            ErrorSelection::Specific(errors) => Ok(errors.clone()),
            ErrorSelection::Categories(categories) => {
                let count = self.sample_count(state.params.error_count);
                let mut errors = self
                    .catalog
                    .sample(categories, state.params.difficulty, count)
                    .await
                    .map_err(|e| DrillError::generation(format!("error catalog failed: {e}")))?;
                errors.truncate(usize::try_from(count).unwrap_or(usize::MAX));
                if errors.len() < usize::try_from(count).unwrap_or(usize::MAX) {
                    warn!(
                        requested = count,
                        returned = errors.len(),
                        "Catalog returned fewer errors than requested"
                    );
                }
                Ok(errors)
            }
        }
    }

    fn pick_domain(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.domains
            .choose(&mut *rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_DOMAINS[0].to_string())
    }

    fn sample_count(&self, range: ErrorCountRange) -> u32 {
        let (low, high) = if range.start <= range.end {
            (range.start, range.end)
        } else {
            (range.end, range.start)
        };
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(low..=high)
    }
}

/// Builds the prompt asking the generator to add exactly the missing errors.
fn regeneration_prompt(snippet: &CodeSnippet, found: &[String], missing: &[String]) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "The Java code below should contain {} deliberate errors, but some are missing.\n",
        snippet.expected_error_count
    );

    let _ = writeln!(prompt, "Add ONLY these missing errors:");
    for label in missing {
        match snippet.raw_errors.iter().find(|e| &e.label() == label) {
            Some(spec) => {
                let _ = writeln!(prompt, "- {}", spec.known_problem());
                if let Some(guide) = &spec.implementation_guide {
                    let _ = writeln!(prompt, "  How: {guide}");
                }
            }
            None => {
                let _ = writeln!(prompt, "- {label}");
            }
        }
    }

    if !found.is_empty() {
        let _ = writeln!(prompt, "\nKeep these errors exactly as they are:");
        for label in found {
            let _ = writeln!(prompt, "- {label}");
        }
    }

    let _ = writeln!(
        prompt,
        "\nPreserve the overall structure of the code. Mark every error with a comment in the annotated version.\n"
    );
    let _ = writeln!(prompt, "Current annotated code:\n```java\n{}\n```\n", snippet.code);
    let _ = write!(
        prompt,
        "Reply with the annotated version in a ```java-annotated block and the same code without error comments in a ```java-clean block."
    );

    prompt
}
