//! Article structuring: turns parsed paper text into clean notes.

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::prompt::build_structure_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::error::AgentError;

/// Truncates `text` to at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Splits `text` into segments of roughly `chunk_chars` characters.
///
/// Paragraph boundaries are preferred; a paragraph longer than the
/// limit is split on character boundaries.
#[must_use]
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    let limit = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let len = paragraph.chars().count();

        if len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = paragraph.chars().collect();
            chunks.extend(chars.chunks(limit).map(|c| c.iter().collect::<String>()));
            continue;
        }

        if current_len > 0 && current_len + 2 + len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(paragraph);
        current_len += len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Restructures a paper's text, one model call per segment.
pub struct ArticleStructurer {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    max_document_chars: usize,
    chunk_chars: usize,
}

impl ArticleStructurer {
    /// Creates a structurer.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.query_model.clone(),
            max_tokens: config.completion_max_tokens,
            system_prompt,
            max_document_chars: config.max_document_chars,
            chunk_chars: config.structure_chunk_chars,
        }
    }

    /// Structures `text` and returns the joined segment notes.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if any model call fails or nothing usable
    /// comes back.
    pub async fn structure(
        &self,
        provider: &dyn LlmProvider,
        text: &str,
    ) -> Result<String, AgentError> {
        let chunks = chunk_text(truncate_chars(text, self.max_document_chars), self.chunk_chars);
        let total = chunks.len();
        let mut parts = Vec::with_capacity(total);

        for (index, chunk) in chunks.iter().enumerate() {
            let response = self
                .execute(provider, &build_structure_prompt(index, total, chunk))
                .await?;
            let part = response.content.trim();
            if !part.is_empty() {
                parts.push(part.to_string());
            }
        }

        debug!(segments = total, kept = parts.len(), "article structured");
        if parts.is_empty() {
            return Err(AgentError::ResponseParse {
                message: "structuring produced no content".to_string(),
                content: String::new(),
            });
        }
        Ok(parts.join("\n\n"))
    }
}

#[async_trait]
impl Agent for ArticleStructurer {
    fn name(&self) -> &'static str {
        "structurer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the segment index back, or nothing for the second segment.
    struct SegmentProvider {
        calls: AtomicUsize,
        blank_second: bool,
    }

    #[async_trait]
    impl LlmProvider for SegmentProvider {
        fn name(&self) -> &'static str {
            "segment"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let user = request.user_prompt().unwrap_or_default();
            let content = if self.blank_second && n == 1 {
                String::new()
            } else {
                let header = user.lines().next().unwrap_or_default();
                format!("notes for {header}")
            };
            Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                finish_reason: None,
            })
        }
    }

    fn structurer(max_chars: usize, chunk_chars: usize) -> ArticleStructurer {
        let config = AgentConfig::builder()
            .api_key("k")
            .max_document_chars(max_chars)
            .structure_chunk_chars(chunk_chars)
            .build()
            .unwrap_or_else(|_| unreachable!());
        ArticleStructurer::new(&config, "sys".to_string())
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("注意力机制", 2), "注意");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_chunk_text_groups_paragraphs() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        assert_eq!(chunk_text(text, 10), vec!["aaaa\n\nbbbb", "cccc"]);
        assert_eq!(chunk_text(text, 100), vec![text]);
    }

    #[test]
    fn test_chunk_text_splits_long_paragraph() {
        let chunks = chunk_text("short\n\nabcdefghij", 4);
        assert_eq!(chunks, vec!["shor", "t", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("\n\n  \n\n", 10).is_empty());
    }

    #[tokio::test]
    async fn test_structure_one_call_per_segment() {
        let provider = SegmentProvider {
            calls: AtomicUsize::new(0),
            blank_second: true,
        };
        let text = "first paragraph\n\nsecond paragraph\n\nthird paragraph";
        let out = structurer(20_000, 20)
            .structure(&provider, text)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(out.contains("index=\"1\" total=\"3\""));
        assert!(!out.contains("index=\"2\""));
        assert!(out.contains("index=\"3\" total=\"3\""));
    }

    #[tokio::test]
    async fn test_structure_empty_output_is_error() {
        let provider = SegmentProvider {
            calls: AtomicUsize::new(1),
            blank_second: true,
        };
        let result = structurer(20_000, 4_000).structure(&provider, "only one").await;
        assert!(matches!(result, Err(AgentError::ResponseParse { .. })));
    }
}
