//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::{RunOutcome, RunStatus};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON, or an error object if that fails.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
    }
}

/// Formats a run outcome.
#[must_use]
pub fn format_outcome(outcome: &RunOutcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(outcome),
        OutputFormat::Text => {
            let mut output = outcome.report.clone();
            let status = match outcome.status {
                RunStatus::Completed => "completed",
                RunStatus::Failed => "failed",
                RunStatus::Terminated => "terminated",
            };
            let _ = write!(
                output,
                "\n\n---\nStatus: {status} | Attempts: {} | Papers: {} | Analyses: {} ok, {} failed of {} | Time: {:.1}s\n",
                outcome.search_attempts,
                outcome.total_papers_found,
                outcome.successful_analyses,
                outcome.failed_analyses,
                outcome.processed_papers,
                outcome.elapsed.as_secs_f64()
            );
            output
        }
    }
}
