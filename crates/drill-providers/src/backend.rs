//! Service implementations on top of a chat-completion client.

use std::sync::Arc;

use async_trait::async_trait;
use drill_engine::{
    AnalysisOutcome, CodeEvaluator, CodeGenerator, CodeLength, Difficulty, ErrorSpec,
    EvaluationOutcome, GuidanceProvider, ReportWriter, ReviewAnalysis, ReviewAnalyzer,
    ReviewAttempt, ServiceResult,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::chat::ChatCompletion;
use crate::error::ProviderError;
use crate::prompts::{
    analysis_prompt, evaluation_prompt, generation_prompt, guidance_prompt, report_prompt,
    SYSTEM_PROMPT,
};

/// Fenced block tagged `json` or untagged.
static JSON_BLOCK: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?s)```(?:json)?[ \t]*\r?\n(.*?)```").unwrap()
});

/// Parses the first JSON object in a model reply.
///
/// Looks inside a fenced block first, then falls back to the outermost braces.
pub(crate) fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, ProviderError> {
    let candidates = JSON_BLOCK
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .chain(outer_braces(text));

    let mut last_error = None;
    for candidate in candidates {
        match serde_json::from_str(candidate.trim()) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(ProviderError::invalid_response(last_error.map_or_else(
        || "no JSON object in reply".to_string(),
        |e| format!("malformed JSON in reply: {e}"),
    )))
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Implements every text-producing service with one chat client.
#[derive(Clone)]
pub struct ChatBackend {
    chat: Arc<dyn ChatCompletion>,
}

impl std::fmt::Debug for ChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatBackend").finish_non_exhaustive()
    }
}

impl ChatBackend {
    /// Creates a backend that sends every request through `chat`.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }

    async fn ask(&self, prompt: &str) -> ServiceResult<String> {
        Ok(self.chat.complete(SYSTEM_PROMPT, prompt).await?)
    }
}

#[async_trait]
impl CodeGenerator for ChatBackend {
    async fn generate(
        &self,
        length: CodeLength,
        difficulty: Difficulty,
        domain: &str,
        errors: &[ErrorSpec],
    ) -> ServiceResult<String> {
        debug!(domain, errors = errors.len(), "Requesting code generation");
        self.ask(&generation_prompt(length, difficulty, domain, errors))
            .await
    }

    async fn regenerate(&self, feedback_prompt: &str) -> ServiceResult<String> {
        debug!("Requesting code regeneration");
        self.ask(feedback_prompt).await
    }
}

#[async_trait]
impl CodeEvaluator for ChatBackend {
    async fn evaluate(
        &self,
        code: &str,
        requested: &[ErrorSpec],
    ) -> ServiceResult<EvaluationOutcome> {
        let reply = self.ask(&evaluation_prompt(code, requested)).await?;
        let outcome: EvaluationOutcome = parse_json_reply(&reply)?;
        debug!(
            found = outcome.found.len(),
            missing = outcome.missing.len(),
            "Evaluation parsed"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl ReviewAnalyzer for ChatBackend {
    async fn analyze(
        &self,
        code: &str,
        known_problems: &[String],
        review_text: &str,
    ) -> ServiceResult<AnalysisOutcome> {
        let reply = self
            .ask(&analysis_prompt(code, known_problems, review_text))
            .await?;
        Ok(parse_json_reply(&reply)?)
    }
}

#[async_trait]
impl GuidanceProvider for ChatBackend {
    async fn guide(
        &self,
        analysis: &ReviewAnalysis,
        iteration: u32,
        max_iterations: u32,
    ) -> ServiceResult<String> {
        let reply = self
            .ask(&guidance_prompt(analysis, iteration, max_iterations))
            .await?;
        Ok(reply.trim().to_string())
    }
}

#[async_trait]
impl ReportWriter for ChatBackend {
    async fn report(
        &self,
        history: &[ReviewAttempt],
        final_analysis: &ReviewAnalysis,
    ) -> ServiceResult<String> {
        let reply = self.ask(&report_prompt(history, final_analysis)).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            warn!("Report reply was blank");
        }
        Ok(reply.to_string())
    }
}
