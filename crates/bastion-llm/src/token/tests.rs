//! Tests for token budgets and counting

use super::*;
use crate::error::Error;
use crate::message::Message;

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn small_validator(max_tokens: usize, overlap_reserve: usize) -> TokenBudgetValidator {
    TokenBudgetValidator::new(TokenBudgetConfig {
        max_tokens,
        overlap_reserve,
    })
}

#[test]
fn test_estimate_tokens() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("abc"), 1);
    assert_eq!(estimate_tokens("abcd"), 1);
    assert_eq!(estimate_tokens("abcde"), 2);
    // counts chars, not bytes
    assert_eq!(estimate_tokens("ééééé"), 2);
}

#[test]
fn test_default_config() {
    let config = TokenBudgetConfig::default();
    assert_eq!(config.max_tokens, 28_000);
    assert_eq!(config.overlap_reserve, 500);
}

#[test]
fn test_under_budget_returns_original_text() {
    let validator = TokenBudgetValidator::default();
    let text = "A short request.\n\nWith two paragraphs.";
    let check = validator
        .validate_and_chunk(text, &["some context".to_string()])
        .unwrap();

    assert!(check.within_budget);
    assert_eq!(check.chunks, vec![text.to_string()]);
    assert_eq!(
        check.token_count,
        estimate_tokens(text) + estimate_tokens("some context")
    );
}

#[test]
fn test_under_budget_is_idempotent_for_many_sizes() {
    let validator = small_validator(100, 10);
    for len in [0, 1, 50, 399, 400] {
        let text = "x".repeat(len);
        let check = validator.validate_and_chunk(&text, &[]).unwrap();
        assert!(check.within_budget, "len {len}");
        assert_eq!(check.chunks, vec![text]);
    }
}

#[test]
fn test_over_budget_chunks_preserve_paragraphs() {
    let validator = small_validator(100, 10);
    let paragraphs: Vec<String> = (0..12)
        .map(|i| format!("Paragraph number {i} talks about topic {i} in some detail."))
        .collect();
    let text = paragraphs.join("\n\n");

    let check = validator.validate_and_chunk(&text, &[]).unwrap();
    assert!(!check.within_budget);
    assert!(check.chunks.len() > 1);

    for chunk in &check.chunks {
        assert!(estimate_tokens(chunk) <= 90, "chunk over capacity: {chunk}");
    }
    for paragraph in &paragraphs {
        assert!(
            check.chunks.iter().any(|c| c.contains(paragraph.as_str())),
            "lost paragraph: {paragraph}"
        );
    }
    assert_eq!(
        strip_whitespace(&check.chunks.concat()),
        strip_whitespace(&text)
    );
}

#[test]
fn test_oversized_paragraph_splits_on_sentences() {
    let validator = small_validator(60, 10);
    let sentence = "This sentence is about forty characters.";
    let paragraph = vec![sentence; 10].join(" ");

    let check = validator.validate_and_chunk(&paragraph, &[]).unwrap();
    assert!(check.chunks.len() > 1);
    for chunk in &check.chunks {
        assert!(chunk.ends_with('.'), "chunk should end on a sentence: {chunk}");
        assert!(estimate_tokens(chunk) <= 50);
    }
    assert_eq!(
        strip_whitespace(&check.chunks.concat()),
        strip_whitespace(&paragraph)
    );
}

#[test]
fn test_oversized_sentence_is_hard_split() {
    let chunks = chunk_text(&"y".repeat(100), 5);
    assert_eq!(chunks.len(), 5);
    assert!(chunks.iter().all(|c| c.chars().count() == 20));
}

#[test]
fn test_context_reduces_capacity() {
    let validator = small_validator(100, 10);
    let context = vec!["c".repeat(200)]; // 50 tokens
    let text = vec!["Short paragraph here."; 20].join("\n\n");

    let check = validator.validate_and_chunk(&text, &context).unwrap();
    assert!(!check.within_budget);
    for chunk in &check.chunks {
        assert!(estimate_tokens(chunk) <= 40);
    }
}

#[test]
fn test_context_too_large() {
    let validator = small_validator(10, 2);
    let result = validator.validate_and_chunk("text", &["z".repeat(100)]);
    assert!(matches!(
        result,
        Err(Error::ContextTooLarge {
            context_tokens: 25,
            budget: 10
        })
    ));
}

#[test]
fn test_no_room_after_reserve_is_context_too_large() {
    let validator = small_validator(10, 5);
    let context = vec!["z".repeat(24)]; // 6 tokens, leaves 4 < reserve
    let result = validator.validate_and_chunk(&"t".repeat(100), &context);
    assert!(matches!(result, Err(Error::ContextTooLarge { .. })));
}

#[test]
fn test_sentence_split_keeps_punctuation() {
    // capacity 2 fits one sentence per chunk
    let chunks = chunk_text("One. Two! Three? Four", 2);
    assert_eq!(chunks, vec!["One.", "Two!", "Three?", "Four"]);
}

#[test]
fn test_token_counter_basic() {
    let counter = TokenCounter::new();
    let tokens = counter.count_tokens("Hello, world!");
    assert!(tokens > 0);
    assert!(tokens < 10);
    assert_eq!(counter.count_tokens(""), 0);
}

#[test]
fn test_count_message_tokens_includes_overhead() {
    let messages = vec![Message::system("Be brief."), Message::user("Hello!")];
    let counter = TokenCounter::new();
    let sum: usize = messages.iter().map(|m| counter.count_tokens(&m.content)).sum();
    assert!(count_message_tokens(&messages) > sum);
}

#[test]
fn test_estimate_message_tokens() {
    let messages = vec![Message::user("abcd"), Message::assistant("abcdefgh")];
    assert_eq!(estimate_message_tokens(&messages), 3);
}
