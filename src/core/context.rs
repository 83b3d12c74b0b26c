//! Execution context: the agent's progress counters and audit trail.
//!
//! The orchestrator owns the single [`ExecutionContext`] of a run. The only
//! state shared with worker tasks is [`AnalysisCounters`], which is atomic.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::state::{ActionType, AgentState};
use crate::academic::PaperMetadata;

/// Outcome of one planned query within a search attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Planned, not yet executed.
    Pending,
    /// Returned at least one record.
    Completed,
    /// Returned nothing.
    NoResults,
    /// The database call failed.
    Error,
}

/// One planned database query and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SearchItem {
    /// Query string sent to the database.
    pub query: String,
    /// Current status.
    pub status: SearchStatus,
    /// Records returned by the query.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<PaperMetadata>,
    /// Failure detail when `status` is [`SearchStatus::Error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchItem {
    /// Creates a pending item for `query`.
    #[must_use]
    pub fn pending(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            status: SearchStatus::Pending,
            results: Vec::new(),
            error: None,
        }
    }

    /// Records a successful call, classifying empty result sets as `NoResults`.
    pub fn complete(&mut self, results: Vec<PaperMetadata>) {
        self.status = if results.is_empty() {
            SearchStatus::NoResults
        } else {
            SearchStatus::Completed
        };
        self.results = results;
    }

    /// Records a failed call.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = SearchStatus::Error;
        self.error = Some(error.into());
    }
}

/// One entry of the append-only execution history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    /// When the record was appended.
    pub timestamp: DateTime<Utc>,
    /// What kind of step produced it.
    pub action: ActionType,
    /// State the agent was in when it was appended.
    pub state: AgentState,
    /// Free-form details.
    pub details: Value,
}

impl HistoryRecord {
    /// The `summary` detail, if one was recorded.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.details.get("summary").and_then(Value::as_str)
    }
}

/// Success and failure counters updated concurrently by paper workers.
#[derive(Debug, Default)]
pub struct AnalysisCounters {
    successful: AtomicUsize,
    failed: AtomicUsize,
}

impl AnalysisCounters {
    /// Counts one successful analysis.
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::SeqCst);
    }

    /// Counts one failed analysis.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Successful analyses so far.
    pub fn successful(&self) -> usize {
        self.successful.load(Ordering::SeqCst)
    }

    /// Failed analyses so far.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Mutable record of one agent run.
#[derive(Debug)]
pub struct ExecutionContext {
    current_state: AgentState,
    /// Passes through `EXECUTING_SEARCH` so far.
    pub search_attempts: u32,
    /// Unique records found by the latest search attempt.
    pub total_papers_found: usize,
    /// Papers dispatched for analysis across all attempts.
    pub processed_papers: usize,
    counters: Arc<AnalysisCounters>,
    /// Keywords used for the next planning pass.
    pub current_keywords: String,
    /// The user's research question.
    pub user_query: String,
    history: Vec<HistoryRecord>,
    /// Queries of the latest planning pass.
    pub search_results: Vec<SearchItem>,
    /// Analysis strings drained from the result queue at synthesis.
    pub analysis_results: Vec<String>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Creates a context in `INITIALIZING` with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_state: AgentState::Initializing,
            search_attempts: 0,
            total_papers_found: 0,
            processed_papers: 0,
            counters: Arc::new(AnalysisCounters::default()),
            current_keywords: String::new(),
            user_query: String::new(),
            history: Vec::new(),
            search_results: Vec::new(),
            analysis_results: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn current_state(&self) -> AgentState {
        self.current_state
    }

    pub(crate) const fn set_state(&mut self, state: AgentState) {
        self.current_state = state;
    }

    /// Shared handle to the analysis counters, for worker tasks.
    #[must_use]
    pub fn counters(&self) -> Arc<AnalysisCounters> {
        Arc::clone(&self.counters)
    }

    /// Successful analyses so far.
    #[must_use]
    pub fn successful_analyses(&self) -> usize {
        self.counters.successful()
    }

    /// Failed analyses so far.
    #[must_use]
    pub fn failed_analyses(&self) -> usize {
        self.counters.failed()
    }

    /// Appends a history record stamped with the current state.
    pub fn record(&mut self, action: ActionType, details: Value) {
        self.history.push(HistoryRecord {
            timestamp: Utc::now(),
            action,
            state: self.current_state,
            details,
        });
    }

    /// The execution history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    /// Number of search items that returned records in the latest attempt.
    #[must_use]
    pub fn productive_queries(&self) -> usize {
        self.search_results
            .iter()
            .filter(|item| item.status == SearchStatus::Completed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_context() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.current_state(), AgentState::Initializing);
        assert_eq!(ctx.search_attempts, 0);
        assert_eq!(ctx.successful_analyses(), 0);
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_record_stamps_current_state() {
        let mut ctx = ExecutionContext::new();
        ctx.set_state(AgentState::PlanningSearch);
        ctx.record(ActionType::KeywordGeneration, json!({"summary": "3 queries"}));

        let record = &ctx.history()[0];
        assert_eq!(record.state, AgentState::PlanningSearch);
        assert_eq!(record.action, ActionType::KeywordGeneration);
        assert_eq!(record.summary(), Some("3 queries"));
    }

    #[test]
    fn test_search_item_classification() {
        let mut empty = SearchItem::pending("all:nothing");
        empty.complete(Vec::new());
        assert_eq!(empty.status, SearchStatus::NoResults);

        let mut failed = SearchItem::pending("ti:broken");
        failed.fail("timeout");
        assert_eq!(failed.status, SearchStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_counters_are_shared_across_tasks() {
        let ctx = ExecutionContext::new();
        let mut handles = Vec::new();
        for i in 0..64 {
            let counters = ctx.counters();
            handles.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    counters.record_failure();
                } else {
                    counters.record_success();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap_or_else(|_| unreachable!());
        }

        assert_eq!(ctx.successful_analyses(), 48);
        assert_eq!(ctx.failed_analyses(), 16);
    }
}
