//! arXiv client using the public Atom query API.
//!
//! Search results come from `/api/query`. Documents are fetched from the
//! arXiv HTML rendering of a paper; papers without one fall back to their
//! title and abstract.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AcademicDb, PaperLink, PaperMetadata, RawDocument};
use crate::error::AgentError;

/// Default arXiv API host.
pub const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

const COLLABORATOR: &str = "arxiv";

/// Atom `<feed>` root.
#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
    #[serde(rename = "@type", default)]
    link_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term", default)]
    term: String,
}

/// Collapses runs of whitespace (arXiv wraps titles and abstracts).
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl From<Entry> for PaperMetadata {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id.trim().to_string(),
            title: squash(&entry.title),
            summary: squash(&entry.summary),
            authors: entry
                .authors
                .into_iter()
                .map(|a| squash(&a.name))
                .filter(|n| !n.is_empty())
                .collect(),
            published: entry.published.map(|p| p.trim().to_string()),
            categories: entry
                .categories
                .into_iter()
                .map(|c| c.term)
                .filter(|t| !t.is_empty())
                .collect(),
            links: entry
                .links
                .into_iter()
                .map(|l| PaperLink {
                    href: l.href,
                    rel: l.rel,
                    content_type: l.link_type,
                })
                .collect(),
        }
    }
}

/// Parses an Atom feed into metadata records.
///
/// arXiv reports query errors as a single entry whose id points at
/// `api/errors`; that entry is surfaced as an error.
pub fn parse_feed(xml: &str) -> Result<Vec<PaperMetadata>, AgentError> {
    let feed: Feed = quick_xml::de::from_str(xml).map_err(|e| AgentError::ResponseParse {
        message: format!("invalid Atom feed: {e}"),
        content: xml.chars().take(300).collect(),
    })?;

    if let Some(err) = feed.entries.iter().find(|e| e.id.contains("api/errors")) {
        return Err(AgentError::external(COLLABORATOR, squash(&err.summary)));
    }

    Ok(feed
        .entries
        .into_iter()
        .filter(|e| !e.id.trim().is_empty())
        .map(PaperMetadata::from)
        .collect())
}

/// Escapes characters the query string cannot carry literally. Spaces
/// become `+`, which the arXiv API reads as a separator.
fn encode_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.trim().chars() {
        match c {
            ' ' => out.push('+'),
            '"' => out.push_str("%22"),
            '#' => out.push_str("%23"),
            '&' => out.push_str("%26"),
            '%' => out.push_str("%25"),
            other => out.push(other),
        }
    }
    out
}

/// URL of the HTML rendering for a record, derived from its abstract page.
fn html_url(metadata: &PaperMetadata) -> Option<String> {
    let abs = metadata
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .map_or(metadata.id.as_str(), |l| l.href.as_str());
    abs.contains("/abs/").then(|| abs.replacen("/abs/", "/html/", 1))
}

/// arXiv [`AcademicDb`] implementation.
#[derive(Debug, Clone)]
pub struct ArxivClient {
    http: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    /// Creates a client against `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("library-index/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, query: &str, max_results: usize) -> String {
        format!(
            "{}/api/query?search_query={}&max_results={}",
            self.base_url,
            encode_query(query),
            max_results.max(1)
        )
    }

    async fn get_text(&self, url: &str) -> Result<(String, String), AgentError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AgentError::external(COLLABORATOR, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::external(
                COLLABORATOR,
                format!("GET {url} returned {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::external(COLLABORATOR, e))?;
        Ok((content_type, body))
    }
}

#[async_trait]
impl AcademicDb for ArxivClient {
    fn name(&self) -> &'static str {
        COLLABORATOR
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<PaperMetadata>, AgentError> {
        let url = self.search_url(query, max_results);
        debug!(%url, "arxiv search");
        let (_, body) = self.get_text(&url).await?;
        parse_feed(&body)
    }

    async fn fetch(&self, metadata: &PaperMetadata) -> Result<RawDocument, AgentError> {
        if let Some(url) = html_url(metadata) {
            match self.get_text(&url).await {
                Ok((content_type, body)) => {
                    return Ok(RawDocument {
                        id: metadata.id.clone(),
                        content_type,
                        bytes: body.into_bytes(),
                    });
                }
                Err(e) => {
                    warn!(id = %metadata.id, error = %e, "no HTML rendering, using abstract");
                }
            }
        }

        if !metadata.has_abstract() {
            return Err(AgentError::external(
                COLLABORATOR,
                format!("no retrievable content for {}", metadata.id),
            ));
        }

        Ok(RawDocument {
            id: metadata.id.clone(),
            content_type: "text/plain".to_string(),
            bytes: format!("{}\n\n{}", metadata.title, metadata.summary).into_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2401.01234v1</id>
    <published>2024-01-03T00:00:00Z</published>
    <title>Efficient
      Transformers</title>
    <summary>  We study sparse
      attention.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2401.01234v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.01234v1"
          rel="related" type="application/pdf"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let records = parse_feed(FEED).unwrap_or_else(|_| unreachable!());
        assert_eq!(records.len(), 1);

        let paper = &records[0];
        assert_eq!(paper.short_id(), "2401.01234v1");
        assert_eq!(paper.title, "Efficient Transformers");
        assert_eq!(paper.summary, "We study sparse attention.");
        assert_eq!(paper.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(paper.categories, vec!["cs.LG", "cs.CL"]);
        assert_eq!(paper.links.len(), 2);
        assert_eq!(
            paper.links[1].content_type.as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn test_parse_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;
        let records = parse_feed(xml).unwrap_or_else(|_| unreachable!());
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_error_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format</id>
    <title>Error</title>
    <summary>incorrect id format</summary>
  </entry>
</feed>"#;
        let err = parse_feed(xml).err();
        assert!(matches!(err, Some(AgentError::ExternalCall { .. })));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_feed("<feed><entry>").is_err());
    }

    #[test]
    fn test_encode_query() {
        assert_eq!(encode_query(r#"ti:"sparse attention""#), "ti:%22sparse+attention%22");
        assert_eq!(encode_query("all:llm+AND+cat:cs.CL"), "all:llm+AND+cat:cs.CL");
    }

    #[test]
    fn test_html_url_from_alternate_link() {
        let records = parse_feed(FEED).unwrap_or_else(|_| unreachable!());
        assert_eq!(
            html_url(&records[0]).as_deref(),
            Some("http://arxiv.org/html/2401.01234v1")
        );
    }

    #[test]
    fn test_search_url() {
        let client = ArxivClient::new("https://export.arxiv.org/", Duration::from_secs(5))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            client.search_url("all:graph neural", 0),
            "https://export.arxiv.org/api/query?search_query=all:graph+neural&max_results=1"
        );
    }
}
