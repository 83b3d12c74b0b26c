//! Academic database collaborator.
//!
//! The agent searches for paper metadata and fetches raw documents through
//! the [`AcademicDb`] trait. Callers are responsible for passing every call
//! through the shared [`RateLimiter`](crate::core::RateLimiter).

#[cfg(feature = "arxiv")]
pub mod arxiv;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[cfg(feature = "arxiv")]
pub use arxiv::ArxivClient;

/// A link attached to a metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperLink {
    /// Target URL.
    pub href: String,
    /// Link relation (`alternate`, `related`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    /// MIME type of the target, when advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Metadata for one paper, as returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    /// Database-assigned unique identifier. Used as the cache key.
    pub id: String,
    /// Paper title.
    pub title: String,
    /// Abstract.
    #[serde(default)]
    pub summary: String,
    /// Author names.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Publication timestamp as reported by the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Subject categories.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Links to alternate renderings of the paper.
    #[serde(default)]
    pub links: Vec<PaperLink>,
}

impl PaperMetadata {
    /// Trailing path segment of the identifier (`2401.01234v2` for an
    /// arXiv abs URL).
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    /// Returns `true` if the record carries a non-blank abstract.
    #[must_use]
    pub fn has_abstract(&self) -> bool {
        !self.summary.trim().is_empty()
    }
}

/// Raw document content fetched from the database.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Identifier of the paper this document belongs to.
    pub id: String,
    /// MIME type of `bytes`.
    pub content_type: String,
    /// Document body.
    pub bytes: Vec<u8>,
}

/// Academic database client.
#[async_trait]
pub trait AcademicDb: Send + Sync {
    /// Database name for logging.
    fn name(&self) -> &'static str;

    /// Searches for up to `max_results` records matching `query`.
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<PaperMetadata>, AgentError>;

    /// Fetches the document described by `metadata`.
    async fn fetch(&self, metadata: &PaperMetadata) -> Result<RawDocument, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        let meta = PaperMetadata {
            id: "http://arxiv.org/abs/2401.01234v2".to_string(),
            title: "t".to_string(),
            summary: String::new(),
            authors: Vec::new(),
            published: None,
            categories: Vec::new(),
            links: Vec::new(),
        };
        assert_eq!(meta.short_id(), "2401.01234v2");
        assert!(!meta.has_abstract());
    }
}
