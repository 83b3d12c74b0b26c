//! Document parsing collaborator: raw bytes to normalized text.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::academic::RawDocument;
use crate::error::AgentError;

/// Converts fetched documents into plain text.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Extracts normalized text from `document`.
    async fn parse(&self, document: &RawDocument) -> Result<String, AgentError>;
}

static SCRIPT_OR_STYLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head|nav|footer)\b.*?</(script|style|head|nav|footer)>").ok()
});
static BLOCK_END: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|section|h[1-6]|li|tr|table|figure)>|<br\s*/?>").ok()
});
static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").ok());
static INLINE_SPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[ \t\r\f]+").ok());
static BLANK_LINES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n\s*\n+").ok());

fn replace(re: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    re.as_ref()
        .map_or_else(|| text.to_string(), |re| re.replace_all(text, with).into_owned())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Normalizes whitespace: single spaces inside lines, at most one blank
/// line between paragraphs.
fn normalize(text: &str) -> String {
    let text = replace(&INLINE_SPACE, text, " ");
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    replace(&BLANK_LINES, &lines.join("\n"), "\n\n").trim().to_string()
}

/// Strips markup from HTML, keeping paragraph breaks.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let text = replace(&SCRIPT_OR_STYLE, html, " ");
    let text = replace(&BLOCK_END, &text, "\n\n");
    let text = replace(&TAG, &text, " ");
    normalize(&decode_entities(&text))
}

/// Parser for HTML and plain-text documents.
///
/// Binary formats such as PDF are rejected; plug in a dedicated parser
/// for those.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupTextParser;

#[async_trait]
impl DocumentParser for MarkupTextParser {
    async fn parse(&self, document: &RawDocument) -> Result<String, AgentError> {
        let content_type = document.content_type.to_ascii_lowercase();
        let body = String::from_utf8_lossy(&document.bytes);

        let text = if content_type.contains("html") || content_type.contains("xml") {
            html_to_text(&body)
        } else if content_type.starts_with("text/") {
            normalize(&body)
        } else {
            return Err(AgentError::external(
                "document-parser",
                format!("unsupported content type {content_type} for {}", document.id),
            ));
        };

        if text.is_empty() {
            return Err(AgentError::external(
                "document-parser",
                format!("document {} has no text", document.id),
            ));
        }
        Ok(text)
    }
}
