//! Token budget validation and content chunking

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Default safety budget for a single upstream request
pub const DEFAULT_TOKEN_BUDGET: usize = 28_000;

/// Tokens held back from every chunk for instructions and boundary notes
pub const DEFAULT_OVERLAP_RESERVE: usize = 500;

const CHARS_PER_TOKEN: usize = 4;

/// Blank line (optionally with trailing whitespace) between paragraphs
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("static regex"));

/// Estimate the token cost of `text`
///
/// Deterministic `ceil(chars / 4)`; monotonic in text length.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Budget configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudgetConfig {
    /// Total token budget for text plus context
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Reserve subtracted from chunk capacity
    #[serde(default = "default_overlap_reserve")]
    pub overlap_reserve: usize,
}

fn default_max_tokens() -> usize {
    DEFAULT_TOKEN_BUDGET
}

fn default_overlap_reserve() -> usize {
    DEFAULT_OVERLAP_RESERVE
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_TOKEN_BUDGET,
            overlap_reserve: DEFAULT_OVERLAP_RESERVE,
        }
    }
}

/// Result of a budget check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetCheck {
    /// Whether text plus context fits the budget
    pub within_budget: bool,
    /// Estimated tokens of text plus context
    pub token_count: usize,
    /// Ordered chunks; a single chunk equal to the input when within budget
    pub chunks: Vec<String>,
}

/// Validates text against a token budget and chunks it when oversized
#[derive(Debug, Clone, Default)]
pub struct TokenBudgetValidator {
    config: TokenBudgetConfig,
}

impl TokenBudgetValidator {
    /// Create a validator with the given configuration
    #[must_use]
    pub fn new(config: TokenBudgetConfig) -> Self {
        Self { config }
    }

    /// The configured budget
    #[must_use]
    pub fn budget(&self) -> usize {
        self.config.max_tokens
    }

    /// Whether `tokens` fits the budget
    #[must_use]
    pub fn fits(&self, tokens: usize) -> bool {
        tokens <= self.config.max_tokens
    }

    /// Check `text` plus `context` against the budget, chunking `text` if needed
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContextTooLarge`] when the context alone exceeds the
    /// budget or leaves no room for content after the overlap reserve.
    pub fn validate_and_chunk(&self, text: &str, context: &[String]) -> Result<BudgetCheck> {
        let budget = self.config.max_tokens;
        let context_tokens: usize = context.iter().map(|c| estimate_tokens(c)).sum();

        if context_tokens > budget {
            return Err(Error::ContextTooLarge {
                context_tokens,
                budget,
            });
        }

        let token_count = estimate_tokens(text) + context_tokens;
        if token_count <= budget {
            return Ok(BudgetCheck {
                within_budget: true,
                token_count,
                chunks: vec![text.to_string()],
            });
        }

        let capacity = budget
            .saturating_sub(context_tokens)
            .saturating_sub(self.config.overlap_reserve);
        if capacity == 0 {
            return Err(Error::ContextTooLarge {
                context_tokens,
                budget,
            });
        }

        let chunks = chunk_text(text, capacity);
        debug!(
            token_count,
            budget,
            capacity,
            chunks = chunks.len(),
            "Text exceeds token budget, chunked"
        );

        Ok(BudgetCheck {
            within_budget: false,
            token_count,
            chunks,
        })
    }
}

/// Split `text` into ordered chunks of at most `capacity` estimated tokens
///
/// Paragraphs are packed greedily; oversized paragraphs fall back to sentence
/// packing, and oversized sentences to a hard character split.
#[must_use]
pub fn chunk_text(text: &str, capacity: usize) -> Vec<String> {
    let capacity = capacity.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in PARAGRAPH_BREAK.split(text).map(str::trim) {
        if paragraph.is_empty() {
            continue;
        }

        if estimate_tokens(paragraph) > capacity {
            flush(&mut current, &mut chunks);
            chunks.extend(split_paragraph(paragraph, capacity));
            continue;
        }

        append(&mut current, &mut chunks, paragraph, "\n\n", capacity);
    }

    flush(&mut current, &mut chunks);
    chunks
}

fn split_paragraph(paragraph: &str, capacity: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(paragraph) {
        if estimate_tokens(sentence) > capacity {
            flush(&mut current, &mut pieces);
            pieces.extend(hard_split(sentence, capacity));
            continue;
        }
        append(&mut current, &mut pieces, sentence, " ", capacity);
    }

    flush(&mut current, &mut pieces);
    pieces
}

/// Add `piece` to `current`, flushing first when it would overflow
fn append(
    current: &mut String,
    out: &mut Vec<String>,
    piece: &str,
    separator: &str,
    capacity: usize,
) {
    if !current.is_empty() {
        let projected =
            estimate_tokens(current) + estimate_tokens(separator) + estimate_tokens(piece);
        if projected > capacity {
            flush(current, out);
        } else {
            current.push_str(separator);
        }
    }
    current.push_str(piece);
}

fn flush(current: &mut String, out: &mut Vec<String>) {
    if !current.is_empty() {
        out.push(std::mem::take(current));
    }
}

/// Sentences end at `.`, `!` or `?` followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = text[start..next_idx].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next_idx;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn hard_split(text: &str, capacity: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(capacity * CHARS_PER_TOKEN)
        .map(|c| c.iter().collect())
        .collect()
}
