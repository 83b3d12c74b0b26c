//! Per-paper processing pipeline run on the bounded worker pool.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::analyst::ArticleStructurer;
use super::provider::LlmProvider;
use super::relevance::RelevanceAgent;
use crate::academic::{AcademicDb, PaperMetadata};
use crate::core::{AnalysisCounters, RateLimiter};
use crate::document::DocumentParser;
use crate::error::AgentError;
use crate::memory::MemoryStore;

/// Everything one paper needs, shared across the pool.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct PaperWorker {
    /// Chat provider for structuring and relevance calls.
    pub llm: Arc<dyn LlmProvider>,
    /// Academic database used to fetch documents.
    pub academic: Arc<dyn AcademicDb>,
    /// Converts fetched documents to text.
    pub parser: Arc<dyn DocumentParser>,
    /// Cache of structured articles keyed by paper id.
    pub memory: Arc<dyn MemoryStore>,
    /// The run's single academic database limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// Structuring agent.
    pub structurer: Arc<ArticleStructurer>,
    /// Relevance agent.
    pub relevance: Arc<RelevanceAgent>,
    /// Shared success and failure counters.
    pub counters: Arc<AnalysisCounters>,
    /// Result queue producer.
    pub results: UnboundedSender<String>,
    /// Run cancellation.
    pub cancel: CancellationToken,
    /// The user's research question.
    pub query: Arc<str>,
}

impl PaperWorker {
    /// Runs the full pipeline for a paper that is not cached.
    ///
    /// Exactly one string is queued: the relevance text on success or a
    /// diagnostic on failure. Nothing is queued if the run was cancelled
    /// before the fetch started.
    pub async fn process(&self, paper: PaperMetadata) {
        if self.cancel.is_cancelled() {
            debug!(id = %paper.id, "skipping paper, run cancelled");
            return;
        }

        match self.run_pipeline(&paper).await {
            Ok(analysis) => {
                self.counters.record_success();
                info!(id = %paper.short_id(), "paper processed");
                self.enqueue(analysis);
            }
            Err(e) => {
                self.counters.record_failure();
                let message = format!("Processing failed (ID: {}): {e}", paper.id);
                warn!(id = %paper.short_id(), error = %e, "paper processing failed");
                self.enqueue(message);
            }
        }
    }

    /// Runs only the relevance step against a cached structured article.
    pub async fn analyze_cached(&self, paper: &PaperMetadata, structured: &str) {
        match self
            .relevance
            .analyze(self.llm.as_ref(), &self.query, structured)
            .await
        {
            Ok(analysis) => {
                self.counters.record_success();
                debug!(id = %paper.short_id(), "analysis from cached article");
                self.enqueue(analysis);
            }
            Err(e) => {
                self.counters.record_failure();
                warn!(id = %paper.short_id(), error = %e, "cached analysis failed");
                self.enqueue(format!("Cached analysis failed (ID: {}): {e}", paper.id));
            }
        }
    }

    async fn run_pipeline(&self, paper: &PaperMetadata) -> Result<String, AgentError> {
        self.rate_limiter.wait_if_needed().await;
        let raw = self.academic.fetch(paper).await?;
        let text = self.parser.parse(&raw).await?;
        let structured = self.structurer.structure(self.llm.as_ref(), &text).await?;
        self.memory.put(&paper.id, &structured).await?;
        self.relevance
            .analyze(self.llm.as_ref(), &self.query, &structured)
            .await
    }

    fn enqueue(&self, text: String) {
        if self.results.send(text).is_err() {
            debug!("result queue closed, dropping analysis");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::academic::RawDocument;
    use crate::agent::config::AgentConfig;
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use crate::document::MarkupTextParser;
    use crate::memory::InMemoryStore;

    struct EchoProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let content = if request.user_prompt().is_some_and(|p| p.contains("<article>")) {
                "Confidence Scoring: Rating: 70/100".to_string()
            } else {
                "structured notes".to_string()
            };
            Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                finish_reason: None,
            })
        }
    }

    struct StubDb {
        fetches: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AcademicDb for StubDb {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> Result<Vec<PaperMetadata>, AgentError> {
            Ok(Vec::new())
        }

        async fn fetch(&self, metadata: &PaperMetadata) -> Result<RawDocument, AgentError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AgentError::external("stub", "connection reset"));
            }
            Ok(RawDocument {
                id: metadata.id.clone(),
                content_type: "text/plain".to_string(),
                bytes: b"Body of the paper.".to_vec(),
            })
        }
    }

    fn paper() -> PaperMetadata {
        PaperMetadata {
            id: "http://arxiv.org/abs/2402.00001v1".to_string(),
            title: "A paper".to_string(),
            summary: "Abstract.".to_string(),
            authors: Vec::new(),
            published: None,
            categories: Vec::new(),
            links: Vec::new(),
        }
    }

    fn worker(
        db: Arc<StubDb>,
        memory: Arc<InMemoryStore>,
    ) -> (PaperWorker, mpsc::UnboundedReceiver<String>) {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = PaperWorker {
            llm: Arc::new(EchoProvider {
                calls: AtomicUsize::new(0),
            }),
            academic: db,
            parser: Arc::new(MarkupTextParser),
            memory,
            rate_limiter: Arc::new(RateLimiter::new(Duration::ZERO)),
            structurer: Arc::new(ArticleStructurer::new(&config, "structure".to_string())),
            relevance: Arc::new(RelevanceAgent::new(&config, "relevance".to_string())),
            counters: Arc::new(AnalysisCounters::default()),
            results: tx,
            cancel: CancellationToken::new(),
            query: Arc::from("sparse attention"),
        };
        (worker, rx)
    }

    #[tokio::test]
    async fn test_process_caches_and_queues_analysis() {
        let db = Arc::new(StubDb {
            fetches: AtomicUsize::new(0),
            fail: false,
        });
        let memory = Arc::new(InMemoryStore::new());
        let (worker, mut rx) = worker(db, Arc::clone(&memory));

        worker.process(paper()).await;

        assert_eq!(worker.counters.successful(), 1);
        assert_eq!(
            rx.try_recv().unwrap_or_default(),
            "Confidence Scoring: Rating: 70/100"
        );
        let cached = memory
            .get("http://arxiv.org/abs/2402.00001v1")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(cached.as_deref(), Some("structured notes"));
    }

    #[tokio::test]
    async fn test_process_failure_queues_diagnostic() {
        let db = Arc::new(StubDb {
            fetches: AtomicUsize::new(0),
            fail: true,
        });
        let memory = Arc::new(InMemoryStore::new());
        let (worker, mut rx) = worker(db, Arc::clone(&memory));

        worker.process(paper()).await;

        assert_eq!(worker.counters.failed(), 1);
        let message = rx.try_recv().unwrap_or_default();
        assert!(message.starts_with("Processing failed (ID: http://arxiv.org/abs/2402.00001v1)"));
        assert!(message.contains("connection reset"));
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_worker_does_nothing() {
        let db = Arc::new(StubDb {
            fetches: AtomicUsize::new(0),
            fail: false,
        });
        let (worker, mut rx) = worker(Arc::clone(&db), Arc::new(InMemoryStore::new()));
        worker.cancel.cancel();

        worker.process(paper()).await;

        assert_eq!(db.fetches.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(worker.counters.successful() + worker.counters.failed(), 0);
    }

    #[tokio::test]
    async fn test_analyze_cached_skips_fetch() {
        let db = Arc::new(StubDb {
            fetches: AtomicUsize::new(0),
            fail: false,
        });
        let (worker, mut rx) = worker(Arc::clone(&db), Arc::new(InMemoryStore::new()));

        worker.analyze_cached(&paper(), "cached notes").await;

        assert_eq!(db.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(worker.counters.successful(), 1);
        assert!(rx.try_recv().is_ok());
    }
}
