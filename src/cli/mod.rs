//! CLI layer for library-index.
//!
//! Provides the command-line interface using clap, with commands for
//! running the research agent and scaffolding prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::{OutputFormat, format_outcome};
pub use parser::{Cli, Commands};
