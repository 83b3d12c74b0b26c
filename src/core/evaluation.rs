//! Search-quality evaluation and the refinement decision.

use std::fmt;

use serde::Serialize;

use super::context::ExecutionContext;

/// What the agent should do after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Nothing was found; widen the keyword set.
    ExpandKeywords,
    /// Too many analyses failed; sharpen the keywords.
    RefineKeywords,
    /// Too few papers; broaden the search.
    BroadenSearch,
    /// Results are good enough to synthesize.
    Continue,
}

impl SuggestedAction {
    /// Snake-case name, also used in prompts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExpandKeywords => "expand_keywords",
            Self::RefineKeywords => "refine_keywords",
            Self::BroadenSearch => "broaden_search",
            Self::Continue => "continue",
        }
    }
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for the refinement decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationPolicy {
    /// Minimum acceptable `successful / processed` ratio.
    pub min_success_rate: f64,
    /// Minimum number of papers per attempt.
    pub min_results: usize,
    /// Maximum number of search attempts.
    pub max_retries: u32,
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    /// Papers found by the latest attempt.
    pub papers_found: usize,
    /// `successful_analyses / max(1, processed_papers)`.
    pub success_rate: f64,
    /// `total_papers_found / max(1, search_attempts)`.
    pub search_efficiency: f64,
    /// Whether another search attempt is warranted.
    pub needs_refinement: bool,
    /// Recommended next step.
    pub suggested_action: SuggestedAction,
}

/// Evaluates the context against `policy`. First matching rule wins:
///
/// 1. nothing found: expand keywords
/// 2. success rate below the minimum: refine keywords
/// 3. too few papers with attempts left: broaden the search
/// 4. otherwise continue
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn evaluate(ctx: &ExecutionContext, policy: &EvaluationPolicy) -> Evaluation {
    let papers_found = ctx.total_papers_found;
    let success_rate = ctx.successful_analyses() as f64 / ctx.processed_papers.max(1) as f64;
    let search_efficiency = papers_found as f64 / f64::from(ctx.search_attempts.max(1));

    let suggested_action = if papers_found == 0 {
        SuggestedAction::ExpandKeywords
    } else if success_rate < policy.min_success_rate {
        SuggestedAction::RefineKeywords
    } else if papers_found < policy.min_results && ctx.search_attempts < policy.max_retries {
        SuggestedAction::BroadenSearch
    } else {
        SuggestedAction::Continue
    };

    Evaluation {
        papers_found,
        success_rate,
        search_efficiency,
        needs_refinement: suggested_action != SuggestedAction::Continue,
        suggested_action,
    }
}
