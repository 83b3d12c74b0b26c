//! Detection and removal of "nothing relevant found" boilerplate.
//!
//! Model output frequently consists of, or is padded with, apologies for
//! not finding anything. Those strings carry no information and must not
//! reach the merger. The pattern library covers Chinese and English.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// Default fraction of boilerplate sentences above which a text is dropped.
pub const DEFAULT_INVALID_FRACTION: f64 = 0.5;

/// Default minimum length (in grapheme clusters) of a retained text.
pub const DEFAULT_MIN_LENGTH: usize = 50;

/// "No relevant content" phrases.
const BOILERPLATE_PATTERNS: &[&str] = &[
    // Chinese
    r"没有?找到.*?(相关|匹配|合适|对应|符合).*?(信息|数据|内容|结果)",
    r"未能?找到.*?(符合|相关|匹配).*?(要求|条件|信息|结果)",
    r"找不到.*?(相关|匹配|合适).*?(信息|数据|内容)",
    r"未检索到.*?(相关|匹配).*?(结果|数据)",
    r"未搜索到.*?(相关|符合|匹配).*?(记录|结果)",
    r"无.*?(匹配|符合|相关).*?(记录|数据|内容)",
    r"无可用.*?(信息|数据|内容)",
    r"没有匹配的.*?(数据|结果|内容)",
    r"没有符合条件的.*?(结果|数据)",
    r"暂时.*?(没有|无).*?(数据|结果|记录)",
    r"查无.*?(结果|数据|记录)",
    r"检索结果为空",
    r"搜索结果为空",
    r"无搜索结果",
    r"无匹配项",
    r"无符合条件的记录",
    r"暂无相关.*?(信息|数据|内容)",
    r"没有查到.*?(信息|数据|内容)",
    // English
    r"no\s+(matching|relevant|appropriate|corresponding)\b.*?(information|data|content|results?)",
    r"not\s+able\s+to\s+find.*?(matching|relevant|appropriate|corresponding).*?(results?|data|content)",
    r"could\s+not\s+find.*?(matching|relevant|appropriate|corresponding).*?(records?|results?|data)",
    r"did\s+not\s+return\s+any\s+(results?|data|records?|match(es)?)",
    r"returned\s+no\s+(results?|data|records?|match(es)?)",
    r"search\s+results?\s+(are|is)\s+empty",
    r"no\s+results?\s+(were\s+)?found",
    r"nothing\s+(was\s+)?found",
    r"there\s+(is|are)\s+no\s+(data|results?|records?|match(es)?)",
    r"currently\s+no\s+(data|results?|records?|match(es)?)",
    r"no\s+available\s+(data|information|content)",
    r"unable\s+to\s+retrieve\s+(any\s+)?(data|information|content)",
    r"no\s+matching\s+entries\s+found",
    r"no\s+entries\s+match\s+your\s+criteria",
];

/// Compiled patterns. Each also consumes trailing sentence punctuation so
/// stripping a phrase does not leave a dangling full stop behind.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BOILERPLATE_PATTERNS
        .iter()
        .filter_map(|p| {
            RegexBuilder::new(&format!("(?:{p})[。！？.!?]*"))
                .case_insensitive(true)
                .build()
                .ok()
        })
        .collect()
});

static SENTENCE_SPLIT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[。！？.!?\n]").ok());

static BLANK_LINES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n\s*\n").ok());

/// Boilerplate filter with configurable thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ContentFilter {
    invalid_fraction: f64,
    min_length: usize,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(DEFAULT_INVALID_FRACTION, DEFAULT_MIN_LENGTH)
    }
}

impl ContentFilter {
    /// Creates a filter.
    ///
    /// A text is dropped when more than `invalid_fraction` of its sentences
    /// are boilerplate, or when fewer than `min_length` characters remain
    /// after the boilerplate phrases are stripped.
    #[must_use]
    pub const fn new(invalid_fraction: f64, min_length: usize) -> Self {
        Self {
            invalid_fraction,
            min_length,
        }
    }

    /// Returns `true` if `text` contains any boilerplate phrase.
    #[must_use]
    pub fn is_boilerplate(text: &str) -> bool {
        PATTERNS.iter().any(|re| re.is_match(text))
    }

    /// Filters `content`, returning the cleaned text or an empty string.
    #[must_use]
    pub fn filter(&self, content: &str) -> String {
        let content = content.trim();
        if content.is_empty() {
            return String::new();
        }

        let sentences: Vec<&str> = SENTENCE_SPLIT.as_ref().map_or_else(
            || vec![content],
            |re| {
                re.split(content)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            },
        );
        let total = sentences.len().max(1);
        let invalid = sentences.iter().filter(|s| Self::is_boilerplate(s)).count();

        #[allow(clippy::cast_precision_loss)]
        if invalid as f64 > total as f64 * self.invalid_fraction {
            debug!(invalid, total, "content dropped as boilerplate");
            return String::new();
        }

        let mut cleaned = content.to_string();
        if invalid > 0 {
            for re in PATTERNS.iter() {
                cleaned = re.replace_all(&cleaned, "").into_owned();
            }
        }
        if let Some(re) = BLANK_LINES.as_ref() {
            cleaned = re.replace_all(cleaned.trim(), "\n\n").into_owned();
        }
        let cleaned = cleaned.trim();

        if cleaned.graphemes(true).count() < self.min_length {
            debug!(
                length = cleaned.len(),
                min = self.min_length,
                "content dropped as too short"
            );
            return String::new();
        }

        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    const SUBSTANTIVE: &str = "The paper proposes a sparse attention scheme that cuts \
        transformer inference cost by forty percent on long documents. \
        It evaluates the method on three summarization benchmarks. \
        Results match dense attention within one ROUGE point.";

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(PATTERNS.len(), BOILERPLATE_PATTERNS.len());
        assert!(SENTENCE_SPLIT.is_some());
        assert!(BLANK_LINES.is_some());
    }

    #[test_case("No relevant information found." ; "english")]
    #[test_case("no relevant information found" ; "english lowercase")]
    #[test_case("Sorry, nothing found." ; "nothing found")]
    #[test_case("没有找到相关信息。" ; "chinese")]
    #[test_case("检索结果为空" ; "chinese empty result")]
    fn test_pure_boilerplate_filters_to_empty(input: &str) {
        assert_eq!(ContentFilter::default().filter(input), "");
    }

    #[test]
    fn test_embedded_phrase_is_stripped() {
        let input = format!("{SUBSTANTIVE}\nNo relevant data was found for the second query.");
        let output = ContentFilter::default().filter(&input);

        assert!(output.contains("sparse attention"));
        assert!(!output.to_lowercase().contains("no relevant data"));
    }

    #[test]
    fn test_short_text_is_dropped() {
        assert_eq!(ContentFilter::default().filter("Too short."), "");
    }

    #[test]
    fn test_substantive_text_is_kept_unchanged() {
        assert_eq!(ContentFilter::default().filter(SUBSTANTIVE), SUBSTANTIVE);
    }

    #[test]
    fn test_blank_lines_are_collapsed() {
        let input = format!("{SUBSTANTIVE}\n\n   \n\n{SUBSTANTIVE}");
        let output = ContentFilter::default().filter(&input);
        assert!(!output.contains("\n\n\n"));
        assert!(output.contains("\n\n"));
    }

    #[test]
    fn test_min_length_counts_characters_not_bytes() {
        let filter = ContentFilter::new(0.5, 10);
        assert_eq!(filter.filter("注意力机制的效率研究"), "注意力机制的效率研究");
        // 27 bytes, 9 characters.
        assert_eq!(filter.filter("注意力机制效率研究"), "");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(ContentFilter::default().filter(""), "");
        assert_eq!(ContentFilter::default().filter("   \n "), "");
    }

    proptest! {
        #[test]
        fn prop_filter_never_lengthens(input in ".{0,400}") {
            let output = ContentFilter::default().filter(&input);
            prop_assert!(output.len() <= input.len());
        }

        #[test]
        fn prop_filter_is_idempotent_on_clean_text(input in "[a-z ]{60,200}") {
            let filter = ContentFilter::default();
            let once = filter.filter(&input);
            prop_assert_eq!(filter.filter(&once), once.clone());
        }
    }
}
