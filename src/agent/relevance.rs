//! Relevance analysis and abstract scoring.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::config::AgentConfig;
use super::prompt::{build_relevance_prompt, build_score_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::error::AgentError;

static SCORE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").ok());

static RATING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:rating\s*[:：]?\s*(\d{1,3})|(\d{1,3})\s*/\s*100)").ok()
});

/// Heading under which the relevance text carries its rating.
const CONFIDENCE_HEADING: &str = "confidence scoring";

/// Extracts the 0-100 rating from a relevance text.
///
/// Looks under the confidence heading first, then anywhere in the text.
#[must_use]
pub fn confidence_rating(text: &str) -> Option<u32> {
    let re = RATING.as_ref()?;
    let lower = text.to_lowercase();
    let section = lower
        .find(CONFIDENCE_HEADING)
        .map_or(lower.as_str(), |idx| &lower[idx..]);

    let caps = re.captures(section).or_else(|| re.captures(&lower))?;
    let digits = caps.get(1).or_else(|| caps.get(2))?;
    digits.as_str().parse::<u32>().ok().map(|n| n.min(100))
}

/// Writes the four-heading relevance assessment for one paper.
pub struct RelevanceAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl RelevanceAgent {
    /// Creates a relevance agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.relevance_model.clone(),
            max_tokens: config.completion_max_tokens,
            system_prompt,
        }
    }

    /// Assesses `article` against `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the call fails or the answer is empty.
    pub async fn analyze(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        article: &str,
    ) -> Result<String, AgentError> {
        let response = self
            .execute(provider, &build_relevance_prompt(query, article))
            .await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(AgentError::ResponseParse {
                message: "empty relevance analysis".to_string(),
                content: response.content,
            });
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl Agent for RelevanceAgent {
    fn name(&self) -> &'static str {
        "relevance"
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

/// Scores an abstract's relevance between 0.0 and 1.0.
pub struct AbstractScorer {
    model: String,
    system_prompt: String,
}

impl AbstractScorer {
    /// Creates a scorer.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.relevance_model.clone(),
            system_prompt,
        }
    }

    /// Returns the score for `abstract_text`, clamped to `[0.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ResponseParse`] when the answer holds no number.
    pub async fn score(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        abstract_text: &str,
    ) -> Result<f32, AgentError> {
        let response = self
            .execute(provider, &build_score_prompt(query, abstract_text))
            .await?;
        parse_score(&response.content).ok_or_else(|| AgentError::ResponseParse {
            message: "no score in response".to_string(),
            content: response.content.clone(),
        })
    }
}

fn parse_score(text: &str) -> Option<f32> {
    let re = SCORE.as_ref()?;
    let value: f32 = re.find(text)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 1.0))
}

#[async_trait]
impl Agent for AbstractScorer {
    fn name(&self) -> &'static str {
        "scorer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        16
    }
}
