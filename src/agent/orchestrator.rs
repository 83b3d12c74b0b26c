//! Orchestrator for the research state machine.
//!
//! Drives one run from the user's question to a synthesized report:
//! keyword analysis → search planning → rate-limited search → bounded
//! fan-out of paper workers → evaluation (with refinement loops) →
//! binary-tree synthesis.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::analyst::ArticleStructurer;
use super::config::AgentConfig;
use super::keywords::{KeywordAgent, KeywordOptimizer};
use super::merger::SynthesisMerger;
use super::planner::QueryPlanner;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::relevance::{AbstractScorer, RelevanceAgent, confidence_rating};
use super::worker::PaperWorker;
use crate::academic::{AcademicDb, PaperMetadata};
use crate::core::{
    ActionType, AgentState, ContentFilter, Evaluation, ExecutionContext, RateLimiter, SearchItem,
    evaluate,
};
use crate::document::DocumentParser;
use crate::error::AgentError;
use crate::io::IoChannel;
use crate::memory::MemoryStore;

/// Prompt shown when the research question is read interactively.
const QUESTION_PROMPT: &str = "Enter your research question: ";

/// Prompt shown when asking for supplementary keywords.
const SUPPLEMENT_PROMPT: &str = "Additional keywords (press Enter to skip): ";

/// The external systems a run depends on.
#[derive(Clone)]
pub struct Collaborators {
    /// Chat completion provider.
    pub llm: Arc<dyn LlmProvider>,
    /// Academic database.
    pub academic: Arc<dyn AcademicDb>,
    /// Structured article cache.
    pub memory: Arc<dyn MemoryStore>,
    /// Raw document to text conversion.
    pub parser: Arc<dyn DocumentParser>,
    /// User-facing input and output.
    pub io: Arc<dyn IoChannel>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Reached `COMPLETED` and emitted a report.
    Completed,
    /// Reached `ERROR`.
    Failed,
    /// Cancelled by the operator.
    Terminated,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Final status.
    pub status: RunStatus,
    /// Report, failure diagnostic, or termination notice.
    pub report: String,
    /// Search attempts made.
    pub search_attempts: u32,
    /// Unique papers found by the latest attempt.
    pub total_papers_found: usize,
    /// Papers handed to processing across all attempts.
    pub processed_papers: usize,
    /// Analyses that produced a relevance text.
    pub successful_analyses: usize,
    /// Analyses that ended in a diagnostic.
    pub failed_analyses: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Runs the research state machine.
///
/// Owns the [`ExecutionContext`], the result queue, and the single
/// [`RateLimiter`] shared by search and every paper worker.
pub struct Orchestrator {
    config: AgentConfig,
    prompts: PromptSet,
    collaborators: Collaborators,
    rate_limiter: Arc<RateLimiter>,
    filter: ContentFilter,
    cancel: CancellationToken,
    context: ExecutionContext,
    initial_query: Option<String>,
    papers: Vec<PaperMetadata>,
    analyzed: HashSet<String>,
    last_evaluation: Option<Evaluation>,
    results_tx: UnboundedSender<String>,
    results_rx: UnboundedReceiver<String>,
    report: Option<String>,
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling
    /// back to compiled-in defaults.
    pub fn new(config: AgentConfig, collaborators: Collaborators) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let rate_limiter = Arc::new(RateLimiter::new(config.api_min_interval));
        let filter = ContentFilter::new(config.filter_invalid_fraction, config.filter_min_length);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            config,
            prompts,
            collaborators,
            rate_limiter,
            filter,
            cancel: CancellationToken::new(),
            context: ExecutionContext::new(),
            initial_query: None,
            papers: Vec::new(),
            analyzed: HashSet::new(),
            last_evaluation: None,
            results_tx,
            results_rx,
            report: None,
        }
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Supplies the research question up front instead of asking for it.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.initial_query = Some(query.into());
        self
    }

    /// Uses `token` to cancel the run.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels this run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The execution context.
    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Runs the state machine to a terminal state or cancellation.
    ///
    /// Never returns an error: handler failures end the run in `ERROR`
    /// with a diagnostic report, and cancellation drops all in-flight
    /// work and reports termination.
    pub async fn run(&mut self) -> RunOutcome {
        let start = Instant::now();
        let cancel = self.cancel.clone();

        let finished = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            status = self.drive() => Some(status),
        };
        let status = finished.unwrap_or_else(|| {
            warn!(state = %self.context.current_state(), "run terminated by operator");
            self.report = Some(AgentError::Interrupted.to_string());
            RunStatus::Terminated
        });

        let report = self.report.take().unwrap_or_default();
        info!(
            status = ?status,
            attempts = self.context.search_attempts,
            elapsed_ms = start.elapsed().as_millis(),
            "run finished"
        );

        RunOutcome {
            status,
            report,
            search_attempts: self.context.search_attempts,
            total_papers_found: self.context.total_papers_found,
            processed_papers: self.context.processed_papers,
            successful_analyses: self.context.successful_analyses(),
            failed_analyses: self.context.failed_analyses(),
            elapsed: start.elapsed(),
        }
    }

    async fn drive(&mut self) -> RunStatus {
        loop {
            let state = self.context.current_state();
            if state.is_terminal() {
                break;
            }
            let step = match self.dispatch(state).await {
                Ok(next) => self.transition(next),
                Err(e) => Err(e),
            };
            if let Err(e) = step {
                self.fail(&e);
            }
        }

        if self.context.current_state() == AgentState::Completed {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        }
    }

    async fn dispatch(&mut self, state: AgentState) -> Result<AgentState, AgentError> {
        match state {
            AgentState::Initializing => self.handle_initialization().await,
            AgentState::AnalyzingQuery => self.handle_query_analysis().await,
            AgentState::PlanningSearch => Ok(self.handle_search_planning().await),
            AgentState::ExecutingSearch => Ok(self.handle_search_execution().await),
            AgentState::ProcessingResults => Ok(self.handle_result_processing().await),
            AgentState::EvaluatingResults => Ok(self.handle_evaluation()),
            AgentState::RefiningStrategy => self.handle_strategy_refinement().await,
            AgentState::Synthesizing => self.handle_synthesis().await,
            AgentState::Completed | AgentState::Error => Err(AgentError::State {
                state: state.to_string(),
            }),
        }
    }

    fn transition(&mut self, next: AgentState) -> Result<(), AgentError> {
        let current = self.context.current_state();
        if !current.can_transition_to(next) {
            return Err(AgentError::State {
                state: format!("{current} -> {next}"),
            });
        }
        self.context.record(
            ActionType::StateTransition,
            json!({
                "from": current.as_str(),
                "to": next.as_str(),
                "summary": format!("{current} -> {next}"),
            }),
        );
        self.context.set_state(next);
        info!(from = %current, to = %next, "state transition");
        Ok(())
    }

    fn fail(&mut self, e: &AgentError) {
        let state = self.context.current_state();
        error!(state = %state, error = %e, "handler failed");
        self.context.record(
            ActionType::StateTransition,
            json!({
                "from": state.as_str(),
                "to": AgentState::Error.as_str(),
                "error": e.to_string(),
                "summary": format!("{state} -> ERROR: {e}"),
            }),
        );
        self.context.set_state(AgentState::Error);
        let report = self.failure_report(e);
        self.report = Some(report);
    }

    async fn handle_initialization(&mut self) -> Result<AgentState, AgentError> {
        let query = match self.initial_query.take() {
            Some(query) => query,
            None => self.collaborators.io.ask(QUESTION_PROMPT).await?,
        };
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::Orchestration {
                message: "research question cannot be empty".to_string(),
            });
        }

        self.context.user_query = query.to_string();
        self.context.record(
            ActionType::QueryAnalysis,
            json!({ "query": query, "summary": "received research question" }),
        );
        Ok(AgentState::AnalyzingQuery)
    }

    async fn handle_query_analysis(&mut self) -> Result<AgentState, AgentError> {
        let agent = KeywordAgent::new(&self.config, self.prompts.keywords.clone());
        let mut keywords = agent
            .generate(self.collaborators.llm.as_ref(), &self.context.user_query)
            .await?;

        self.collaborators
            .io
            .tell(&format!("Search keywords: {keywords}"))
            .await?;

        if self.config.ask_supplementary_keywords {
            let extra = self.collaborators.io.ask(SUPPLEMENT_PROMPT).await?;
            let extra = extra.trim();
            if !extra.is_empty() {
                keywords = format!("{keywords}, {extra}");
            }
        }

        debug!(keywords = %keywords, "keywords generated");
        self.context.record(
            ActionType::KeywordGeneration,
            json!({ "keywords": keywords, "summary": format!("keywords: {keywords}") }),
        );
        self.context.current_keywords = keywords;
        Ok(AgentState::PlanningSearch)
    }

    async fn handle_search_planning(&mut self) -> AgentState {
        let planner = QueryPlanner::new(&self.config, self.prompts.planner.clone());
        let queries = planner
            .plan(
                self.collaborators.llm.as_ref(),
                &self.context.current_keywords,
            )
            .await;

        let per_query = self.config.search_max_results;
        info!(
            queries = queries.len(),
            per_query,
            expected = queries.len() * per_query,
            "search planned"
        );
        self.context.record(
            ActionType::SearchExecution,
            json!({
                "queries": queries,
                "total_queries": queries.len(),
                "max_papers_per_query": per_query,
                "expected_total": queries.len() * per_query,
                "summary": format!("planned {} queries", queries.len()),
            }),
        );
        self.context.search_results = queries.into_iter().map(SearchItem::pending).collect();
        AgentState::ExecutingSearch
    }

    async fn handle_search_execution(&mut self) -> AgentState {
        self.context.search_attempts += 1;
        let attempt = self.context.search_attempts;
        let mut seen = HashSet::new();
        let mut papers = Vec::new();

        for item in &mut self.context.search_results {
            self.rate_limiter.wait_if_needed().await;
            match self
                .collaborators
                .academic
                .search(&item.query, self.config.search_max_results)
                .await
            {
                Ok(records) => {
                    for record in &records {
                        if seen.insert(record.id.clone()) {
                            papers.push(record.clone());
                        }
                    }
                    item.complete(records);
                }
                Err(e) => {
                    warn!(query = %item.query, error = %e, "search query failed");
                    item.fail(e.to_string());
                }
            }
            debug!(query = %item.query, status = ?item.status, "search query done");
        }

        let productive = self.context.productive_queries();
        let total = self.context.search_results.len();
        self.context.total_papers_found = papers.len();
        info!(attempt, papers = papers.len(), productive, total, "search executed");
        self.context.record(
            ActionType::SearchExecution,
            json!({
                "attempt": attempt,
                "papers_found": papers.len(),
                "productive_queries": productive,
                "total_queries": total,
                "summary": format!(
                    "attempt {attempt}: {} papers from {productive}/{total} queries",
                    papers.len()
                ),
            }),
        );
        self.papers = papers;

        if productive > 0 {
            AgentState::ProcessingResults
        } else {
            AgentState::EvaluatingResults
        }
    }

    /// Drops papers whose abstract scores below the configured threshold.
    async fn prefilter(&self, papers: Vec<PaperMetadata>) -> (Vec<PaperMetadata>, usize) {
        let threshold = self.config.abstract_relevance_threshold;
        if threshold <= 0.0 {
            return (papers, 0);
        }

        let scorer = AbstractScorer::new(&self.config, self.prompts.scorer.clone());
        let mut kept = Vec::with_capacity(papers.len());
        let mut skipped = 0;
        for paper in papers {
            if !paper.has_abstract() {
                kept.push(paper);
                continue;
            }
            match scorer
                .score(
                    self.collaborators.llm.as_ref(),
                    &self.context.user_query,
                    &paper.summary,
                )
                .await
            {
                Ok(score) if score < threshold => {
                    debug!(id = %paper.short_id(), score, threshold, "paper below threshold");
                    skipped += 1;
                }
                Ok(_) => kept.push(paper),
                Err(e) => {
                    warn!(
                        id = %paper.short_id(),
                        error = %e,
                        "abstract scoring failed, keeping paper"
                    );
                    kept.push(paper);
                }
            }
        }
        (kept, skipped)
    }

    fn worker(&self) -> PaperWorker {
        PaperWorker {
            llm: Arc::clone(&self.collaborators.llm),
            academic: Arc::clone(&self.collaborators.academic),
            parser: Arc::clone(&self.collaborators.parser),
            memory: Arc::clone(&self.collaborators.memory),
            rate_limiter: Arc::clone(&self.rate_limiter),
            structurer: Arc::new(ArticleStructurer::new(
                &self.config,
                self.prompts.structurer.clone(),
            )),
            relevance: Arc::new(RelevanceAgent::new(
                &self.config,
                self.prompts.relevance.clone(),
            )),
            counters: self.context.counters(),
            results: self.results_tx.clone(),
            cancel: self.cancel.clone(),
            query: Arc::from(self.context.user_query.as_str()),
        }
    }

    async fn handle_result_processing(&mut self) -> AgentState {
        let found = std::mem::take(&mut self.papers);
        let before = found.len();
        // Papers analyzed in an earlier attempt are neither re-run nor re-counted.
        let fresh: Vec<PaperMetadata> = found
            .into_iter()
            .filter(|p| !self.analyzed.contains(&p.id))
            .collect();
        let repeated = before - fresh.len();
        let (papers, skipped) = self.prefilter(fresh).await;
        let worker = self.worker();
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut set = JoinSet::new();
        let mut cached = 0usize;
        let mut dispatched = 0usize;

        for paper in papers {
            if self.cancel.is_cancelled() {
                break;
            }
            self.analyzed.insert(paper.id.clone());
            self.context.processed_papers += 1;

            match self.collaborators.memory.get(&paper.id).await {
                Ok(Some(structured)) => {
                    cached += 1;
                    worker.analyze_cached(&paper, &structured).await;
                    continue;
                }
                Ok(None) => {}
                Err(e) => warn!(id = %paper.short_id(), error = %e, "cache lookup failed"),
            }

            dispatched += 1;
            let sem = Arc::clone(&semaphore);
            let worker = worker.clone();
            set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                worker.process(paper).await;
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "paper task failed to join");
            }
        }

        let processed = self.context.processed_papers;
        let successful = self.context.successful_analyses();
        info!(dispatched, cached, skipped, repeated, successful, processed, "results processed");
        self.context.record(
            ActionType::ResultProcessing,
            json!({
                "total_processed": processed,
                "dispatched": dispatched,
                "cached": cached,
                "skipped": skipped,
                "repeated": repeated,
                "successful": successful,
                "failed": self.context.failed_analyses(),
                "summary": format!("processed: {successful}/{processed} successful"),
            }),
        );
        AgentState::EvaluatingResults
    }

    fn handle_evaluation(&mut self) -> AgentState {
        let evaluation = evaluate(&self.context, &self.config.evaluation_policy());
        let refine = evaluation.needs_refinement
            && self.context.search_attempts < self.config.max_search_retries;

        info!(
            papers = evaluation.papers_found,
            success_rate = evaluation.success_rate,
            action = %evaluation.suggested_action,
            refine,
            "results evaluated"
        );
        self.context.record(
            ActionType::Evaluation,
            json!({
                "evaluation": evaluation,
                "summary": format!(
                    "{} papers, {:.0}% success, action {}",
                    evaluation.papers_found,
                    evaluation.success_rate * 100.0,
                    evaluation.suggested_action
                ),
            }),
        );
        self.last_evaluation = Some(evaluation);

        if refine {
            AgentState::RefiningStrategy
        } else {
            AgentState::Synthesizing
        }
    }

    async fn handle_strategy_refinement(&mut self) -> Result<AgentState, AgentError> {
        let evaluation = self
            .last_evaluation
            .unwrap_or_else(|| evaluate(&self.context, &self.config.evaluation_policy()));
        let optimizer = KeywordOptimizer::new(&self.config, self.prompts.optimizer.clone());
        let keywords = optimizer
            .optimize(self.collaborators.llm.as_ref(), &self.context, &evaluation)
            .await?;

        info!(action = %evaluation.suggested_action, keywords = %keywords, "strategy refined");
        self.context.record(
            ActionType::StrategyRefinement,
            json!({
                "old_keywords": self.context.current_keywords,
                "new_keywords": keywords,
                "action": evaluation.suggested_action,
                "summary": format!("{}: {keywords}", evaluation.suggested_action),
            }),
        );
        self.context.current_keywords = keywords;
        Ok(AgentState::PlanningSearch)
    }

    fn drain_results(&mut self) -> Vec<String> {
        let mut results = Vec::new();
        while let Ok(result) = self.results_rx.try_recv() {
            results.push(result);
        }
        results
    }

    async fn handle_synthesis(&mut self) -> Result<AgentState, AgentError> {
        let drained = self.drain_results();
        self.context.analysis_results.extend(drained);

        let merger = SynthesisMerger::new(
            &self.config,
            Arc::clone(&self.collaborators.llm),
            self.prompts.merger.clone(),
            self.filter,
        );
        let synthesis = merger
            .merge(&self.context.user_query, &self.context.analysis_results)
            .await;

        let report = if synthesis.is_empty() {
            self.no_results_report()
        } else {
            self.final_report(&synthesis)
        };
        self.collaborators.io.tell(&report).await?;

        self.context.record(
            ActionType::Synthesis,
            json!({
                "inputs": self.context.analysis_results.len(),
                "report_chars": report.chars().count(),
                "summary": if synthesis.is_empty() { "no results" } else { "report generated" },
            }),
        );
        self.report = Some(report);
        Ok(AgentState::Completed)
    }

    #[allow(clippy::cast_precision_loss)]
    fn final_report(&self, synthesis: &str) -> String {
        let ctx = &self.context;
        let rate = ctx.successful_analyses() as f64 / ctx.processed_papers.max(1) as f64 * 100.0;
        let mut report = format!(
            "# Research Report: {}\n\n## Execution Overview\n\n",
            ctx.user_query
        );
        let _ = writeln!(report, "- Search attempts: {}", ctx.search_attempts);
        let _ = writeln!(report, "- Papers found: {}", ctx.total_papers_found);
        let _ = writeln!(
            report,
            "- Successful analyses: {}/{}",
            ctx.successful_analyses(),
            ctx.processed_papers
        );
        let _ = writeln!(report, "- Success rate: {rate:.1}%");
        report.push_str("\n## Findings\n\n");
        report.push_str(synthesis);
        report
    }

    fn no_results_report(&self) -> String {
        format!(
            "No relevant results were found for \"{}\" after {} search attempt(s).\n\n\
             Suggestions:\n\
             - Try more general keywords\n\
             - Search related fields or synonyms\n\
             - Check whether the question is too specific",
            self.context.user_query, self.context.search_attempts
        )
    }

    /// Diagnostic plus the most confident partial analysis, if any.
    fn failure_report(&mut self, e: &AgentError) -> String {
        let drained = self.drain_results();
        self.context.analysis_results.extend(drained);

        let mut report = format!("execution did not complete: {e}");
        let candidates: Vec<String> = self
            .context
            .analysis_results
            .iter()
            .map(|r| self.filter.filter(r))
            .filter(|r| !r.is_empty())
            .collect();
        let best = candidates
            .iter()
            .filter_map(|c| confidence_rating(c).map(|rating| (rating, c)))
            .fold(None::<(u32, &String)>, |best, (rating, c)| match best {
                Some((top, _)) if top >= rating => best,
                _ => Some((rating, c)),
            })
            .map(|(_, c)| c)
            .or_else(|| candidates.first());

        if let Some(best) = best {
            report.push_str("\n\nBest partial analysis:\n\n");
            report.push_str(best);
        }
        report
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.collaborators.llm.name())
            .field("academic", &self.collaborators.academic.name())
            .field("config", &self.config)
            .field("state", &self.context.current_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::academic::RawDocument;
    use crate::agent::message::{ChatRequest, ChatResponse};
    use crate::document::MarkupTextParser;
    use crate::memory::InMemoryStore;

    struct OfflineLlm;

    #[async_trait]
    impl LlmProvider for OfflineLlm {
        fn name(&self) -> &'static str {
            "offline"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Err(AgentError::ApiRequest {
                message: "offline".to_string(),
                status: None,
            })
        }
    }

    struct EmptyDb;

    #[async_trait]
    impl AcademicDb for EmptyDb {
        fn name(&self) -> &'static str {
            "empty"
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> Result<Vec<PaperMetadata>, AgentError> {
            Ok(Vec::new())
        }

        async fn fetch(&self, _metadata: &PaperMetadata) -> Result<RawDocument, AgentError> {
            Err(AgentError::external("empty", "no documents"))
        }
    }

    struct SilentIo;

    #[async_trait]
    impl IoChannel for SilentIo {
        async fn ask(&self, _prompt: &str) -> Result<String, AgentError> {
            Ok(String::new())
        }

        async fn tell(&self, _text: &str) -> Result<(), AgentError> {
            Ok(())
        }
    }

    fn orchestrator() -> Orchestrator {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let collaborators = Collaborators {
            llm: Arc::new(OfflineLlm),
            academic: Arc::new(EmptyDb),
            memory: Arc::new(InMemoryStore::new()),
            parser: Arc::new(MarkupTextParser),
            io: Arc::new(SilentIo),
        };
        Orchestrator::new(config, collaborators).with_prompts(PromptSet::defaults())
    }

    const LOW: &str = "Sparse attention halves memory use on long inputs.\n\
                       Confidence Scoring: Rating: 40/100";
    const HIGH: &str = "Linear attention matches dense accuracy at a fraction of the cost.\n\
                        Confidence Scoring: Rating: 90/100";

    #[test]
    fn test_failure_report_includes_most_confident_analysis() {
        let mut o = orchestrator();
        for text in [LOW, "No relevant results were found.", HIGH] {
            o.results_tx
                .send(text.to_string())
                .unwrap_or_else(|_| unreachable!());
        }

        o.fail(&AgentError::Orchestration {
            message: "boom".to_string(),
        });

        let report = o.report.take().unwrap_or_default();
        assert!(report.starts_with("execution did not complete: orchestration error: boom"));
        assert!(report.ends_with(HIGH));
        assert_eq!(o.context.current_state(), AgentState::Error);
        assert_eq!(o.context.analysis_results.len(), 3);
    }

    #[test]
    fn test_failure_report_without_analyses() {
        let mut o = orchestrator();
        o.fail(&AgentError::Interrupted);
        assert_eq!(
            o.report.as_deref(),
            Some("execution did not complete: execution was manually terminated")
        );
    }

    #[test]
    fn test_transition_rejects_edges_outside_the_table() {
        let mut o = orchestrator();
        let result = o.transition(AgentState::Synthesizing);
        assert!(matches!(result, Err(AgentError::State { .. })));
        assert_eq!(o.context.current_state(), AgentState::Initializing);
        assert!(o.context.history().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_state_has_no_handler() {
        let mut o = orchestrator();
        o.context.set_state(AgentState::Completed);
        let result = o.dispatch(AgentState::Completed).await;
        assert!(matches!(result, Err(AgentError::State { .. })));
    }

    #[tokio::test]
    async fn test_keyword_failure_fails_run() {
        let mut o = orchestrator().with_query("transformer efficiency");
        let outcome = o.run().await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.search_attempts, 0);
        assert!(outcome.report.contains("offline"));
    }
}
