//! # library-index
//!
//! A research agent for academic literature. Given a research question
//! it generates search keywords, plans arXiv queries, fetches and
//! analyzes the matching papers concurrently, evaluates the results
//! (refining its keywords when they are weak), and merges the per-paper
//! analyses into one report with a binary-tree synthesis.
//!
//! ## Architecture
//!
//! - [`core`]: state machine, execution context, rate limiter, content
//!   filter and the evaluation policy. No I/O.
//! - [`agent`]: LLM-backed roles and the [`Orchestrator`] that runs the
//!   state machine.
//! - [`academic`], [`document`], [`memory`], [`io`]: collaborator traits
//!   with their default implementations.
//! - [`cli`]: the `library-index` command-line interface.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use library_index::academic::ArxivClient;
//! use library_index::agent::{AgentConfig, Collaborators, Orchestrator, create_provider};
//! use library_index::document::MarkupTextParser;
//! use library_index::io::TerminalIo;
//! use library_index::memory::InMemoryStore;
//!
//! # async fn run() -> library_index::Result<()> {
//! let config = AgentConfig::from_env()?;
//! let collaborators = Collaborators {
//!     llm: create_provider(&config)?,
//!     academic: Arc::new(ArxivClient::new(config.arxiv_base_url.clone(), config.timeout)?),
//!     memory: Arc::new(InMemoryStore::new()),
//!     parser: Arc::new(MarkupTextParser),
//!     io: Arc::new(TerminalIo::new()),
//! };
//!
//! let outcome = Orchestrator::new(config, collaborators)
//!     .with_query("How can transformer inference be made more efficient?")
//!     .run()
//!     .await;
//! println!("{}", outcome.report);
//! # Ok(())
//! # }
//! ```

pub mod academic;
pub mod agent;
pub mod cli;
pub mod core;
pub mod document;
pub mod error;
pub mod io;
pub mod memory;

pub use agent::{AgentConfig, Collaborators, Orchestrator, RunOutcome, RunStatus};
pub use core::{AgentState, ContentFilter, ExecutionContext, RateLimiter};
pub use error::{AgentError, CommandError, Error, Result};
