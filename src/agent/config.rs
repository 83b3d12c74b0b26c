//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::EvaluationPolicy;
use crate::core::content_filter::{DEFAULT_INVALID_FRACTION, DEFAULT_MIN_LENGTH};
use crate::error::AgentError;

/// Default model for every role.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default max tokens for single-shot completions.
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Default number of search attempts.
const DEFAULT_MAX_SEARCH_RETRIES: u32 = 3;
/// Default minimum acceptable analysis success rate.
const DEFAULT_MIN_SUCCESS_RATE: f64 = 0.3;
/// Default minimum papers per attempt.
const DEFAULT_MIN_RESULTS: usize = 3;
/// Default worker pool size.
const DEFAULT_MAX_WORKERS: usize = 8;
/// Default minimum interval between academic database calls, in seconds.
const DEFAULT_API_MIN_INTERVAL_SECS: u64 = 3;
/// Default records requested per search query.
const DEFAULT_SEARCH_MAX_RESULTS: usize = 1;
/// Default merge token budget for the first level.
const DEFAULT_MERGE_BASE_TOKENS: u32 = 1000;
/// Default merge token budget increase per level.
const DEFAULT_MERGE_STEP_TOKENS: u32 = 500;
/// Default merge token budget ceiling.
const DEFAULT_MERGE_CAP_TOKENS: u32 = 4000;
/// Default cap on document text passed to structuring.
const DEFAULT_MAX_DOCUMENT_CHARS: usize = 20_000;
/// Default structuring chunk size.
const DEFAULT_STRUCTURE_CHUNK_CHARS: usize = 4000;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the research agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for keyword generation, optimization, structuring and merging.
    pub query_model: String,
    /// Model for turning keywords into database queries.
    pub planner_model: String,
    /// Model for relevance analysis and abstract scoring.
    pub relevance_model: String,
    /// Maximum tokens for single-shot completions.
    pub completion_max_tokens: u32,
    /// Maximum number of search attempts before synthesizing anyway.
    pub max_search_retries: u32,
    /// Minimum acceptable `successful / processed` ratio.
    pub min_success_rate: f64,
    /// Minimum number of papers per attempt.
    pub min_results: usize,
    /// Upper bound on concurrent paper workers and merge tasks.
    pub max_workers: usize,
    /// Minimum interval between academic database calls.
    pub api_min_interval: Duration,
    /// Records requested per search query.
    pub search_max_results: usize,
    /// Merge token budget for the first level.
    pub merge_base_tokens: u32,
    /// Merge token budget increase per level.
    pub merge_step_tokens: u32,
    /// Merge token budget ceiling.
    pub merge_cap_tokens: u32,
    /// Fraction of boilerplate sentences above which a text is dropped.
    pub filter_invalid_fraction: f64,
    /// Minimum characters of a retained text.
    pub filter_min_length: usize,
    /// Abstracts scoring below this are skipped. `0.0` disables scoring.
    pub abstract_relevance_threshold: f32,
    /// Characters of document text passed to structuring.
    pub max_document_chars: usize,
    /// Target size of one structuring chunk.
    pub structure_chunk_chars: usize,
    /// Ask the operator for extra keywords after analysis.
    pub ask_supplementary_keywords: bool,
    /// Request timeout for LLM and database calls.
    pub timeout: Duration,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for missing files.
    pub prompt_dir: Option<PathBuf>,
    /// Location of the `SQLite` memory store.
    pub memory_path: Option<PathBuf>,
    /// arXiv API host.
    pub arxiv_base_url: String,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Thresholds for the refinement decision.
    #[must_use]
    pub const fn evaluation_policy(&self) -> EvaluationPolicy {
        EvaluationPolicy {
            min_success_rate: self.min_success_rate,
            min_results: self.min_results,
            max_retries: self.max_search_retries,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    query_model: Option<String>,
    planner_model: Option<String>,
    relevance_model: Option<String>,
    completion_max_tokens: Option<u32>,
    max_search_retries: Option<u32>,
    min_success_rate: Option<f64>,
    min_results: Option<usize>,
    max_workers: Option<usize>,
    api_min_interval: Option<Duration>,
    search_max_results: Option<usize>,
    merge_base_tokens: Option<u32>,
    merge_step_tokens: Option<u32>,
    merge_cap_tokens: Option<u32>,
    filter_invalid_fraction: Option<f64>,
    filter_min_length: Option<usize>,
    abstract_relevance_threshold: Option<f32>,
    max_document_chars: Option<usize>,
    structure_chunk_chars: Option<usize>,
    ask_supplementary_keywords: Option<bool>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    memory_path: Option<PathBuf>,
    arxiv_base_url: Option<String>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("LI_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("LI_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("LI_BASE_URL"))
                .ok();
        }
        if self.query_model.is_none() {
            self.query_model = std::env::var("LI_QUERY_MODEL").ok();
        }
        if self.planner_model.is_none() {
            self.planner_model = std::env::var("LI_PLANNER_MODEL").ok();
        }
        if self.relevance_model.is_none() {
            self.relevance_model = std::env::var("LI_RELEVANCE_MODEL").ok();
        }
        if self.completion_max_tokens.is_none() {
            self.completion_max_tokens = env_parse("LI_MAX_TOKENS");
        }
        if self.max_search_retries.is_none() {
            self.max_search_retries = env_parse("LI_MAX_SEARCH_RETRIES");
        }
        if self.min_success_rate.is_none() {
            self.min_success_rate = env_parse("LI_MIN_SUCCESS_RATE");
        }
        if self.min_results.is_none() {
            self.min_results = env_parse("LI_MIN_RESULTS");
        }
        if self.max_workers.is_none() {
            self.max_workers = env_parse("LI_MAX_WORKERS");
        }
        if self.api_min_interval.is_none() {
            self.api_min_interval = env_parse::<f64>("LI_API_MIN_INTERVAL_SECS")
                .and_then(|s| Duration::try_from_secs_f64(s).ok());
        }
        if self.search_max_results.is_none() {
            self.search_max_results = env_parse("LI_SEARCH_MAX_RESULTS");
        }
        if self.merge_base_tokens.is_none() {
            self.merge_base_tokens = env_parse("LI_MERGE_BASE_TOKENS");
        }
        if self.merge_step_tokens.is_none() {
            self.merge_step_tokens = env_parse("LI_MERGE_STEP_TOKENS");
        }
        if self.merge_cap_tokens.is_none() {
            self.merge_cap_tokens = env_parse("LI_MERGE_CAP_TOKENS");
        }
        if self.filter_invalid_fraction.is_none() {
            self.filter_invalid_fraction = env_parse("LI_FILTER_INVALID_FRACTION");
        }
        if self.filter_min_length.is_none() {
            self.filter_min_length = env_parse("LI_FILTER_MIN_LENGTH");
        }
        if self.abstract_relevance_threshold.is_none() {
            self.abstract_relevance_threshold = env_parse("LI_ABSTRACT_THRESHOLD");
        }
        if self.max_document_chars.is_none() {
            self.max_document_chars = env_parse("LI_MAX_DOCUMENT_CHARS");
        }
        if self.timeout.is_none() {
            self.timeout = env_parse("LI_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("LI_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.memory_path.is_none() {
            self.memory_path = std::env::var("LI_MEMORY_PATH").ok().map(PathBuf::from);
        }
        if self.arxiv_base_url.is_none() {
            self.arxiv_base_url = std::env::var("LI_ARXIV_BASE_URL").ok();
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the query-processing model.
    #[must_use]
    pub fn query_model(mut self, model: impl Into<String>) -> Self {
        self.query_model = Some(model.into());
        self
    }

    /// Sets the query-planning model.
    #[must_use]
    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    /// Sets the relevance model.
    #[must_use]
    pub fn relevance_model(mut self, model: impl Into<String>) -> Self {
        self.relevance_model = Some(model.into());
        self
    }

    /// Sets the max tokens for single-shot completions.
    #[must_use]
    pub const fn completion_max_tokens(mut self, n: u32) -> Self {
        self.completion_max_tokens = Some(n);
        self
    }

    /// Sets the maximum number of search attempts.
    #[must_use]
    pub const fn max_search_retries(mut self, n: u32) -> Self {
        self.max_search_retries = Some(n);
        self
    }

    /// Sets the minimum acceptable success rate.
    #[must_use]
    pub const fn min_success_rate(mut self, rate: f64) -> Self {
        self.min_success_rate = Some(rate);
        self
    }

    /// Sets the minimum papers per attempt.
    #[must_use]
    pub const fn min_results(mut self, n: usize) -> Self {
        self.min_results = Some(n);
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub const fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n);
        self
    }

    /// Sets the minimum interval between academic database calls.
    #[must_use]
    pub const fn api_min_interval(mut self, interval: Duration) -> Self {
        self.api_min_interval = Some(interval);
        self
    }

    /// Sets the records requested per search query.
    #[must_use]
    pub const fn search_max_results(mut self, n: usize) -> Self {
        self.search_max_results = Some(n);
        self
    }

    /// Sets the merge token budget base, step and cap.
    #[must_use]
    pub const fn merge_tokens(mut self, base: u32, step: u32, cap: u32) -> Self {
        self.merge_base_tokens = Some(base);
        self.merge_step_tokens = Some(step);
        self.merge_cap_tokens = Some(cap);
        self
    }

    /// Sets the content filter thresholds.
    #[must_use]
    pub const fn content_filter(mut self, invalid_fraction: f64, min_length: usize) -> Self {
        self.filter_invalid_fraction = Some(invalid_fraction);
        self.filter_min_length = Some(min_length);
        self
    }

    /// Sets the abstract pre-filter threshold.
    #[must_use]
    pub const fn abstract_relevance_threshold(mut self, threshold: f32) -> Self {
        self.abstract_relevance_threshold = Some(threshold);
        self
    }

    /// Sets the cap on document text passed to structuring.
    #[must_use]
    pub const fn max_document_chars(mut self, n: usize) -> Self {
        self.max_document_chars = Some(n);
        self
    }

    /// Sets the structuring chunk size.
    #[must_use]
    pub const fn structure_chunk_chars(mut self, n: usize) -> Self {
        self.structure_chunk_chars = Some(n);
        self
    }

    /// Enables or disables the supplementary-keyword prompt.
    #[must_use]
    pub const fn ask_supplementary_keywords(mut self, ask: bool) -> Self {
        self.ask_supplementary_keywords = Some(ask);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the memory store location.
    #[must_use]
    pub fn memory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory_path = Some(path.into());
        self
    }

    /// Sets the arXiv API host.
    #[must_use]
    pub fn arxiv_base_url(mut self, url: impl Into<String>) -> Self {
        self.arxiv_base_url = Some(url.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, and
    /// [`AgentError::Configuration`] if a value is out of range.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let config = AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            query_model: self
                .query_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            planner_model: self
                .planner_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            relevance_model: self
                .relevance_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            completion_max_tokens: self.completion_max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            max_search_retries: self
                .max_search_retries
                .unwrap_or(DEFAULT_MAX_SEARCH_RETRIES),
            min_success_rate: self.min_success_rate.unwrap_or(DEFAULT_MIN_SUCCESS_RATE),
            min_results: self.min_results.unwrap_or(DEFAULT_MIN_RESULTS),
            max_workers: self.max_workers.unwrap_or(DEFAULT_MAX_WORKERS),
            api_min_interval: self
                .api_min_interval
                .unwrap_or(Duration::from_secs(DEFAULT_API_MIN_INTERVAL_SECS)),
            search_max_results: self
                .search_max_results
                .unwrap_or(DEFAULT_SEARCH_MAX_RESULTS),
            merge_base_tokens: self.merge_base_tokens.unwrap_or(DEFAULT_MERGE_BASE_TOKENS),
            merge_step_tokens: self.merge_step_tokens.unwrap_or(DEFAULT_MERGE_STEP_TOKENS),
            merge_cap_tokens: self.merge_cap_tokens.unwrap_or(DEFAULT_MERGE_CAP_TOKENS),
            filter_invalid_fraction: self
                .filter_invalid_fraction
                .unwrap_or(DEFAULT_INVALID_FRACTION),
            filter_min_length: self.filter_min_length.unwrap_or(DEFAULT_MIN_LENGTH),
            abstract_relevance_threshold: self.abstract_relevance_threshold.unwrap_or(0.0),
            max_document_chars: self
                .max_document_chars
                .unwrap_or(DEFAULT_MAX_DOCUMENT_CHARS),
            structure_chunk_chars: self
                .structure_chunk_chars
                .unwrap_or(DEFAULT_STRUCTURE_CHUNK_CHARS),
            ask_supplementary_keywords: self.ask_supplementary_keywords.unwrap_or(false),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
            memory_path: self.memory_path,
            arxiv_base_url: self
                .arxiv_base_url
                .unwrap_or_else(|| "https://export.arxiv.org".to_string()),
        };

        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &AgentConfig) -> Result<(), AgentError> {
    let invalid = |message: &str| {
        Err(AgentError::Configuration {
            message: message.to_string(),
        })
    };

    if config.max_workers == 0 {
        return invalid("max_workers must be at least 1");
    }
    if !(0.0..=1.0).contains(&config.min_success_rate) {
        return invalid("min_success_rate must be within 0.0..=1.0");
    }
    if !(config.filter_invalid_fraction > 0.0 && config.filter_invalid_fraction <= 1.0) {
        return invalid("filter_invalid_fraction must be within (0.0, 1.0]");
    }
    if config.merge_cap_tokens < config.merge_base_tokens {
        return invalid("merge_cap_tokens must not be below merge_base_tokens");
    }
    if !(0.0..=1.0).contains(&config.abstract_relevance_threshold) {
        return invalid("abstract_relevance_threshold must be within 0.0..=1.0");
    }
    if config.structure_chunk_chars == 0 {
        return invalid("structure_chunk_chars must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(config.max_search_retries, 3);
        assert_eq!(config.api_min_interval, Duration::from_secs(3));
        assert_eq!(
            (config.merge_base_tokens, config.merge_step_tokens, config.merge_cap_tokens),
            (1000, 500, 4000)
        );
        assert_eq!(config.filter_min_length, 50);
        assert_eq!(config.query_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .query_model("deepseek-chat")
            .max_workers(2)
            .max_search_retries(5)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.query_model, "deepseek-chat");
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.evaluation_policy().max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_rejects_zero_workers() {
        let result = AgentConfig::builder().api_key("k").max_workers(0).build();
        assert!(matches!(result, Err(AgentError::Configuration { .. })));
    }

    #[test]
    fn test_builder_rejects_inverted_merge_budget() {
        let result = AgentConfig::builder()
            .api_key("k")
            .merge_tokens(4000, 500, 1000)
            .build();
        assert!(matches!(result, Err(AgentError::Configuration { .. })));
    }

    #[test]
    fn test_builder_rejects_bad_success_rate() {
        let result = AgentConfig::builder()
            .api_key("k")
            .min_success_rate(1.5)
            .build();
        assert!(result.is_err());
    }
}
