//! Collaborator-independent building blocks of the agent.
//!
//! Nothing in this module calls a model or the network: the state graph,
//! the execution context, the rate limiter, the boilerplate filter and
//! the evaluation policy are all plain data and logic.

pub mod content_filter;
pub mod context;
pub mod evaluation;
pub mod rate_limiter;
pub mod state;

pub use content_filter::ContentFilter;
pub use context::{AnalysisCounters, ExecutionContext, HistoryRecord, SearchItem, SearchStatus};
pub use evaluation::{Evaluation, EvaluationPolicy, SuggestedAction, evaluate};
pub use rate_limiter::RateLimiter;
pub use state::{ActionType, AgentState};
