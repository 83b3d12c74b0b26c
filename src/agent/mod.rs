//! LLM-backed research agent.
//!
//! Each model-backed role is an [`Agent`] with its own prompt and
//! sampling settings; the [`Orchestrator`] runs them from a state
//! machine. Providers are pluggable behind [`LlmProvider`] and backed by
//! OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! Research question → Orchestrator
//!   ├── KeywordAgent (question → keywords)
//!   ├── QueryPlanner (keywords → arXiv search queries)
//!   ├── AcademicDb search (serial, rate limited)
//!   ├── Fan-out → N concurrent PaperWorkers
//!   │   └── fetch → parse → ArticleStructurer → cache → RelevanceAgent
//!   ├── Evaluation → KeywordOptimizer (refinement loop)
//!   └── SynthesisMerger (binary-tree merge) → final report
//! ```

pub mod analyst;
pub mod client;
pub mod config;
pub mod keywords;
pub mod merger;
pub mod message;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod relevance;
pub mod traits;
pub mod worker;

// Re-export key types
pub use analyst::ArticleStructurer;
pub use client::create_provider;
pub use config::{AgentConfig, AgentConfigBuilder};
pub use keywords::{KeywordAgent, KeywordOptimizer, summarize_execution_history};
pub use merger::{SynthesisMerger, token_budget};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{Collaborators, Orchestrator, RunOutcome, RunStatus};
pub use planner::QueryPlanner;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use relevance::{AbstractScorer, RelevanceAgent, confidence_rating};
pub use traits::{Agent, AgentResponse};
pub use worker::PaperWorker;
