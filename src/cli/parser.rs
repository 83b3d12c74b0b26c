//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// library-index: a research agent for academic literature.
///
/// Turns a research question into arXiv searches, analyzes the papers it
/// finds with an LLM, and synthesizes a report.
#[derive(Parser, Debug)]
#[command(name = "library-index")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the research agent on a question.
    ///
    /// Requires an OpenAI-compatible API key (`OPENAI_API_KEY` or
    /// `LI_API_KEY`). Press Ctrl-C to terminate a run.
    #[command(after_help = r#"Examples:
  library-index run "How can transformer inference be made more efficient?"
  library-index run --interactive                 # Ask for the question
  library-index run "graph neural networks for recommendation" --max-retries 2
  library-index --format json run "sparse attention" | jq '.status'
  OPENAI_API_KEY=sk-... library-index run "protein folding with diffusion models"
"#)]
    Run {
        /// The research question. Asked for interactively when omitted.
        query: Option<String>,

        /// Ask for supplementary keywords after keyword generation.
        #[arg(short, long)]
        interactive: bool,

        /// Maximum search attempts before synthesizing.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Maximum concurrent paper workers and merges.
        #[arg(long)]
        max_workers: Option<usize>,

        /// Minimum seconds between academic database calls.
        #[arg(long)]
        min_interval: Option<f64>,

        /// Maximum papers requested per search query.
        #[arg(long)]
        max_results: Option<usize>,

        /// Model for keywords, structuring and merging.
        #[arg(long)]
        query_model: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long, env = "LI_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,

        /// Path to the analysis cache database.
        #[arg(long, env = "LI_MEMORY_PATH")]
        memory_path: Option<PathBuf>,
    },

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  library-index init-prompts                      # ~/.config/library-index/prompts
  library-index init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_options() {
        let cli = Cli::try_parse_from([
            "library-index",
            "--format",
            "json",
            "run",
            "sparse attention",
            "--max-retries",
            "2",
            "--min-interval",
            "0.5",
            "-i",
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Run {
                query,
                interactive,
                max_retries,
                min_interval,
                ..
            } => {
                assert_eq!(query.as_deref(), Some("sparse attention"));
                assert!(interactive);
                assert_eq!(max_retries, Some(2));
                assert_eq!(min_interval, Some(0.5));
            }
            Commands::InitPrompts { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_parse_init_prompts() {
        let cli = Cli::try_parse_from(["library-index", "init-prompts", "--dir", "p"])
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(cli.command, Commands::InitPrompts { dir: Some(_) }));
    }
}
