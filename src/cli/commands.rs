//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::AgentConfig;
use crate::agent::prompt::PromptSet;
use crate::cli::output::OutputFormat;
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};

/// Parameters for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunParams<'a> {
    /// The research question, if given on the command line.
    pub query: Option<&'a str>,
    /// Ask for supplementary keywords.
    pub interactive: bool,
    /// Maximum search attempts.
    pub max_retries: Option<u32>,
    /// Maximum concurrent workers.
    pub max_workers: Option<usize>,
    /// Minimum seconds between academic database calls.
    pub min_interval: Option<f64>,
    /// Maximum papers per search query.
    pub max_results: Option<usize>,
    /// Model for keywords, structuring and merging.
    pub query_model: Option<&'a str>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// Path to the analysis cache database.
    pub memory_path: Option<&'a Path>,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run {
            query,
            interactive,
            max_retries,
            max_workers,
            min_interval,
            max_results,
            query_model,
            prompt_dir,
            memory_path,
        } => {
            let params = RunParams {
                query: query.as_deref(),
                interactive: *interactive,
                max_retries: *max_retries,
                max_workers: *max_workers,
                min_interval: *min_interval,
                max_results: *max_results,
                query_model: query_model.as_deref(),
                prompt_dir: prompt_dir.as_deref(),
                memory_path: memory_path.as_deref(),
            };
            cmd_run(&params, format)
        }
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds the agent configuration from env plus CLI overrides.
fn build_config(params: &RunParams<'_>) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(n) = params.max_retries {
        builder = builder.max_search_retries(n);
    }
    if let Some(n) = params.max_workers {
        builder = builder.max_workers(n);
    }
    if let Some(secs) = params.min_interval {
        let interval = Duration::try_from_secs_f64(secs).map_err(|e| {
            CommandError::InvalidArgument(format!("--min-interval {secs}: {e}"))
        })?;
        builder = builder.api_min_interval(interval);
    }
    if let Some(n) = params.max_results {
        builder = builder.search_max_results(n);
    }
    if let Some(model) = params.query_model {
        builder = builder.query_model(model);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(path) = params.memory_path {
        builder = builder.memory_path(path);
    }
    if params.interactive {
        builder = builder.ask_supplementary_keywords(true);
    }

    Ok(builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?)
}

#[cfg(feature = "arxiv")]
fn cmd_run(params: &RunParams<'_>, format: OutputFormat) -> Result<String> {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use crate::academic::ArxivClient;
    use crate::agent::{Collaborators, Orchestrator, create_provider};
    use crate::cli::output::format_outcome;
    use crate::document::MarkupTextParser;
    use crate::io::TerminalIo;
    use crate::memory::SqliteMemory;

    let config = build_config(params)?;

    let llm = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let academic = ArxivClient::new(config.arxiv_base_url.clone(), config.timeout).map_err(|e| {
        CommandError::ExecutionFailed(format!("arXiv client creation failed: {e}"))
    })?;
    let memory_path = config
        .memory_path
        .clone()
        .or_else(SqliteMemory::default_path)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine cache directory for the memory database".to_string(),
            )
        })?;
    let memory = SqliteMemory::open(&memory_path)?;

    let collaborators = Collaborators {
        llm,
        academic: Arc::new(academic),
        memory: Arc::new(memory),
        parser: Arc::new(MarkupTextParser),
        io: Arc::new(TerminalIo::new()),
    };

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let query = params.query.map(str::to_string);
    let outcome = rt.block_on(async move {
        let cancel = CancellationToken::new();
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                watcher.cancel();
            }
        });

        let mut orchestrator = Orchestrator::new(config, collaborators).with_cancellation(cancel);
        if let Some(query) = query {
            orchestrator = orchestrator.with_query(query);
        }
        orchestrator.run().await
    });
    // Leave the Ctrl-C watcher behind instead of waiting on it.
    rt.shutdown_background();

    Ok(format_outcome(&outcome, format))
}

#[cfg(not(feature = "arxiv"))]
fn cmd_run(params: &RunParams<'_>, _format: OutputFormat) -> Result<String> {
    build_config(params)?;
    Err(CommandError::ExecutionFailed(
        "this build has no academic database client; enable the `arxiv` feature".to_string(),
    )
    .into())
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let _ = writeln!(
                    output,
                    "  {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                );
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_init_prompts_writes_then_skips() {
        let temp = TempDir::new().unwrap_or_else(|_| unreachable!());
        let dir = temp.path().join("prompts");

        let first = cmd_init_prompts(Some(&dir), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(first.starts_with("Wrote 7 prompt template(s)"));
        assert!(first.contains("merger.md"));
        assert!(dir.join("planner.md").exists());

        let second = cmd_init_prompts(Some(&dir), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(second.starts_with("All prompt templates already exist"));
    }

    #[test]
    fn test_init_prompts_json() {
        let temp = TempDir::new().unwrap_or_else(|_| unreachable!());
        let output = cmd_init_prompts(Some(temp.path()), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value =
            serde_json::from_str(&output).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["count"], 7);
    }

    #[test]
    fn test_negative_interval_is_rejected() {
        let params = RunParams {
            min_interval: Some(-1.0),
            ..RunParams::default()
        };
        let result = build_config(&params);
        assert!(matches!(
            result,
            Err(Error::Command(CommandError::InvalidArgument(_)))
        ));
    }
}
