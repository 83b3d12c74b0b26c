//! Keyword generation and refinement.

use std::fmt::Write;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::prompt::{build_keywords_prompt, build_optimizer_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::{ActionType, Evaluation, ExecutionContext, HistoryRecord};
use crate::error::AgentError;

/// Number of history records included in the optimizer prompt.
const HISTORY_WINDOW: usize = 4;

/// Normalizes a model's keyword answer into one comma-separated line.
fn clean_keywords(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("```text")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .lines()
        .flat_map(|line| line.split([',', '，', ';']))
        .map(|k| k.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns a research question into search keywords.
pub struct KeywordAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl KeywordAgent {
    /// Creates a keyword agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.query_model.clone(),
            max_tokens: config.completion_max_tokens,
            system_prompt,
        }
    }

    /// Generates keywords for `query`.
    ///
    /// An empty answer falls back to the question itself.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the model call fails.
    pub async fn generate(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
    ) -> Result<String, AgentError> {
        let response = self.execute(provider, &build_keywords_prompt(query)).await?;
        let keywords = clean_keywords(&response.content);
        if keywords.is_empty() {
            warn!("keyword agent returned nothing, using the raw query");
            return Ok(query.trim().to_string());
        }
        Ok(keywords)
    }
}

#[async_trait]
impl Agent for KeywordAgent {
    fn name(&self) -> &'static str {
        "keywords"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.7
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Summarizes the most recent non-transition history records, one line each.
#[must_use]
pub fn summarize_execution_history(history: &[HistoryRecord]) -> String {
    let steps: Vec<&HistoryRecord> = history
        .iter()
        .filter(|r| r.action != ActionType::StateTransition)
        .collect();
    if steps.is_empty() {
        return "No execution history yet.".to_string();
    }

    let start = steps.len().saturating_sub(HISTORY_WINDOW);
    let mut summary = String::new();
    for record in &steps[start..] {
        let _ = writeln!(
            summary,
            "- {}: {}",
            record.action,
            record.summary().unwrap_or("done")
        );
    }
    summary.trim_end().to_string()
}

/// Produces revised keywords after an unsatisfactory search attempt.
pub struct KeywordOptimizer {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl KeywordOptimizer {
    /// Creates an optimizer.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.query_model.clone(),
            max_tokens: config.completion_max_tokens,
            system_prompt,
        }
    }

    /// Returns new keywords for the next planning pass.
    ///
    /// An empty answer keeps the current keywords.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the model call fails.
    pub async fn optimize(
        &self,
        provider: &dyn LlmProvider,
        ctx: &ExecutionContext,
        evaluation: &Evaluation,
    ) -> Result<String, AgentError> {
        let history = summarize_execution_history(ctx.history());
        let prompt = build_optimizer_prompt(
            &ctx.user_query,
            &ctx.current_keywords,
            ctx.search_attempts,
            evaluation,
            &history,
        );
        let response = self.execute(provider, &prompt).await?;
        let keywords = clean_keywords(&response.content);
        debug!(old = %ctx.current_keywords, new = %keywords, "keywords optimized");
        if keywords.is_empty() {
            return Ok(ctx.current_keywords.clone());
        }
        Ok(keywords)
    }
}

#[async_trait]
impl Agent for KeywordOptimizer {
    fn name(&self) -> &'static str {
        "keyword-optimizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
