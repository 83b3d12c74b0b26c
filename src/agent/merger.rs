//! Binary-tree synthesis of per-paper analyses.
//!
//! Analyses are merged pairwise, level by level, until one remains.
//! Pairs within a level run concurrently on a bounded pool; results
//! keep their input order regardless of completion order. Each level
//! gets a larger token budget than the one below it, capped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::prompt::{build_merge_prompt, render_merger_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::ContentFilter;

/// Token budget for a 1-based merge `level`: `min(base + level * step, cap)`.
#[must_use]
pub const fn token_budget(level: u32, base: u32, step: u32, cap: u32) -> u32 {
    let budget = base.saturating_add(level.saturating_mul(step));
    if budget < cap { budget } else { cap }
}

/// Merge agent for one level, with that level's rendered prompt and budget.
struct LevelMerger {
    model: String,
    system_prompt: String,
    budget: u32,
}

#[async_trait]
impl Agent for LevelMerger {
    fn name(&self) -> &'static str {
        "merger"
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
        self.budget
    }
}

/// Concatenates two inputs when the model's merge is unusable.
fn fallback_merge(filter: ContentFilter, first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (false, false) => {
            let joined = filter.filter(&format!("{first}\n\n{second}"));
            if joined.is_empty() {
                first.to_string()
            } else {
                joined
            }
        }
        (false, true) => first.to_string(),
        (true, _) => second.to_string(),
    }
}

async fn merge_pair(
    agent: &LevelMerger,
    provider: &dyn LlmProvider,
    filter: ContentFilter,
    query: &str,
    first: &str,
    second: &str,
) -> String {
    match agent
        .execute(provider, &build_merge_prompt(query, first, second))
        .await
    {
        Ok(response) => {
            let merged = filter.filter(&response.content);
            if !merged.is_empty() {
                return merged;
            }
            debug!(budget = agent.budget, "merge output filtered out, concatenating");
        }
        Err(e) => warn!(error = %e, budget = agent.budget, "merge call failed, concatenating"),
    }
    fallback_merge(filter, first, second)
}

/// Merges analyses into a single synthesis.
#[derive(Clone)]
pub struct SynthesisMerger {
    provider: Arc<dyn LlmProvider>,
    filter: ContentFilter,
    model: String,
    prompt_template: String,
    base_tokens: u32,
    step_tokens: u32,
    cap_tokens: u32,
    max_workers: usize,
}

impl SynthesisMerger {
    /// Creates a merger from configuration.
    #[must_use]
    pub fn new(
        config: &AgentConfig,
        provider: Arc<dyn LlmProvider>,
        prompt_template: String,
        filter: ContentFilter,
    ) -> Self {
        Self {
            provider,
            filter,
            model: config.query_model.clone(),
            prompt_template,
            base_tokens: config.merge_base_tokens,
            step_tokens: config.merge_step_tokens,
            cap_tokens: config.merge_cap_tokens,
            max_workers: config.max_workers.max(1),
        }
    }

    /// Token budget for a 1-based merge level.
    #[must_use]
    pub const fn budget_for(&self, level: u32) -> u32 {
        token_budget(level, self.base_tokens, self.step_tokens, self.cap_tokens)
    }

    /// Merges `results` for `query`.
    ///
    /// Inputs are filtered first. No survivors yields an empty string and
    /// a single survivor is returned without any model call.
    pub async fn merge(&self, query: &str, results: &[String]) -> String {
        let mut items: Vec<String> = results
            .iter()
            .map(|r| self.filter.filter(r))
            .filter(|r| !r.is_empty())
            .collect();
        debug!(inputs = results.len(), kept = items.len(), "merge inputs filtered");

        if items.len() <= 1 {
            return items.pop().unwrap_or_default();
        }

        let mut level = 1u32;
        while items.len() > 1 {
            let next = self.merge_level(query, items.clone(), level).await;
            if next.is_empty() {
                warn!(level, "merge level produced nothing, keeping previous level");
                return items.into_iter().next().unwrap_or_default();
            }
            info!(level, from = items.len(), to = next.len(), "merge level complete");
            items = next;
            level += 1;
        }
        items.into_iter().next().unwrap_or_default()
    }

    async fn merge_level(&self, query: &str, items: Vec<String>, level: u32) -> Vec<String> {
        let budget = self.budget_for(level);
        let agent = Arc::new(LevelMerger {
            model: self.model.clone(),
            system_prompt: render_merger_prompt(&self.prompt_template, budget),
            budget,
        });

        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut carry = None;
        let mut iter = items.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => pairs.push((first, second)),
                None => carry = Some(first),
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_workers.min(pairs.len()).max(1)));
        let fallbacks: Vec<String> = pairs.iter().map(|(first, _)| first.clone()).collect();
        let mut slots: Vec<Option<String>> = vec![None; pairs.len()];
        let mut set = JoinSet::new();

        for (idx, (first, second)) in pairs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let agent = Arc::clone(&agent);
            let provider = Arc::clone(&self.provider);
            let filter = self.filter;
            let query = query.to_string();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let merged =
                    merge_pair(&agent, provider.as_ref(), filter, &query, &first, &second).await;
                (idx, merged)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, merged)) => {
                    if let Some(slot) = slots.get_mut(idx) {
                        *slot = Some(merged);
                    }
                }
                Err(e) => warn!(error = %e, level, "merge task failed"),
            }
        }

        let mut next: Vec<String> = slots
            .into_iter()
            .zip(fallbacks)
            .map(|(slot, fallback)| slot.unwrap_or(fallback))
            .filter(|s| !s.is_empty())
            .collect();
        next.extend(carry);
        next
    }
}
