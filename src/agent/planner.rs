//! Query planner: turns keywords into arXiv `search_query` expressions.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::prompt::build_planner_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;

/// Upper bound on queries taken from one plan.
pub const MAX_QUERIES: usize = 10;

/// Field prefixes accepted by the arXiv query API.
pub const FIELD_PREFIXES: &[&str] = &["ti", "au", "abs", "co", "jr", "cat", "rn", "id", "all"];

static FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?:^|[+(\s"])([A-Za-z]+):"#).ok());

/// Whether every field prefix in `query` is a known arXiv field and at least one is present.
#[must_use]
pub fn is_valid_query(query: &str) -> bool {
    let Some(field) = FIELD.as_ref() else {
        return false;
    };
    let mut seen = false;
    for caps in field.captures_iter(query) {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        if !FIELD_PREFIXES.contains(&prefix) {
            return false;
        }
        seen = true;
    }
    seen
}

/// Query used when planning fails: comma-separated terms, inner whitespace
/// and term boundaries both joined with `+`, searched in all fields.
#[must_use]
pub fn fallback_query(keywords: &str) -> String {
    let terms: Vec<String> = keywords
        .split([',', '，'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join("+"))
        .collect();
    format!("all:{}", terms.join("+"))
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().trim_end_matches("```").trim()
}

fn parse_json_list(text: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(text).ok()
}

/// Extracts a list of query strings from a model answer.
///
/// Tries a JSON array, then a single-quoted array, then the first
/// bracketed span, and finally one query per line.
#[must_use]
pub fn parse_query_list(raw: &str) -> Vec<String> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Vec::new();
    }

    if let Some(list) = parse_json_list(text) {
        return list;
    }
    if let Some(list) = parse_json_list(&text.replace('\'', "\"")) {
        return list;
    }
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']'))
        && start < end
    {
        let span = &text[start..=end];
        if let Some(list) =
            parse_json_list(span).or_else(|| parse_json_list(&span.replace('\'', "\"")))
        {
            return list;
        }
    }

    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*')
                })
                .trim()
                .trim_end_matches(',')
                .trim_matches(['"', '\'', '`'])
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Keeps valid, distinct queries in their original order, at most [`MAX_QUERIES`].
#[must_use]
pub fn validate_queries(queries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| is_valid_query(q))
        .filter(|q| seen.insert(q.clone()))
        .take(MAX_QUERIES)
        .collect()
}

/// Plans the search queries for one attempt.
pub struct QueryPlanner {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl QueryPlanner {
    /// Creates a planner.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.completion_max_tokens,
            system_prompt,
        }
    }

    /// Returns the ordered query list for `keywords`.
    ///
    /// Empty keywords yield no queries. A failed call or an unusable
    /// answer yields the single [`fallback_query`].
    pub async fn plan(&self, provider: &dyn LlmProvider, keywords: &str) -> Vec<String> {
        if keywords.trim().is_empty() {
            return Vec::new();
        }

        let queries = match self.execute(provider, &build_planner_prompt(keywords)).await {
            Ok(response) => validate_queries(parse_query_list(&response.content)),
            Err(e) => {
                warn!(error = %e, "query planning failed");
                Vec::new()
            }
        };

        if queries.is_empty() {
            let fallback = fallback_query(keywords);
            debug!(query = %fallback, "using fallback query");
            return vec![fallback];
        }
        queries
    }
}

#[async_trait]
impl Agent for QueryPlanner {
    fn name(&self) -> &'static str {
        "planner"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
