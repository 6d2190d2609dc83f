//! Task classification and complexity assessment

use super::types::{Complexity, TaskType};
use crate::token::estimate_tokens;
use regex::Regex;
use std::sync::LazyLock;

const SEARCH_KEYWORDS: &[&str] = &[
    "search", "find", "look up", "lookup", "latest", "news", "current", "who is", "where is",
    "when did", "sources", "website",
];

const WRITING_KEYWORDS: &[&str] = &[
    "write", "draft", "compose", "essay", "article", "report", "blog", "email", "letter",
    "rewrite", "story", "outline",
];

const ANALYSIS_KEYWORDS: &[&str] = &[
    "analyze", "analyse", "analysis", "compare", "evaluate", "assess", "explain why",
    "trade-off", "tradeoff", "pros and cons", "implications", "root cause", "critique",
];

const SUMMARIZATION_KEYWORDS: &[&str] = &[
    "summarize", "summarise", "summary", "tl;dr", "tldr", "condense", "key points", "recap",
    "overview", "gist",
];

/// Phrases that signal a demanding request; each match adds one point
static COMPLEXITY_PHRASES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(in[- ]depth|comprehensive|detailed|thorough|exhaustive)\b",
        r"(?i)\bstep[- ]by[- ]step\b",
        r"(?i)\b(multiple|several|various|many)\s+(sources|perspectives|factors|documents|angles)\b",
        r"(?i)\b(compare|contrast)\b.*\b(with|versus|vs\.?|against)\b",
        r"(?i)\b(trade-?offs?|implications|nuances?|edge cases)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static complexity pattern"))
    .collect()
});

fn count_matches(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(*kw)).count()
}

/// Classify the task by keyword scoring over task description and input
///
/// Ties go to the earlier entry in `Analysis, Writing, Summarization, Search`;
/// no match at all is `General`.
#[must_use]
pub fn classify_task(task: Option<&str>, input: &str) -> TaskType {
    let text = match task {
        Some(task) => format!("{} {}", task, input).to_lowercase(),
        None => input.to_lowercase(),
    };

    let scores = [
        (TaskType::Analysis, count_matches(&text, ANALYSIS_KEYWORDS)),
        (TaskType::Writing, count_matches(&text, WRITING_KEYWORDS)),
        (
            TaskType::Summarization,
            count_matches(&text, SUMMARIZATION_KEYWORDS),
        ),
        (TaskType::Search, count_matches(&text, SEARCH_KEYWORDS)),
    ];

    let mut best = (TaskType::General, 0);
    for (task_type, score) in scores {
        if score > best.1 {
            best = (task_type, score);
        }
    }
    best.0
}

fn length_bucket(chars: usize) -> u32 {
    match chars {
        0..200 => 0,
        200..1_000 => 1,
        1_000..4_000 => 2,
        _ => 3,
    }
}

fn context_bucket(tokens: usize) -> u32 {
    match tokens {
        0 => 0,
        1..4_000 => 1,
        _ => 2,
    }
}

/// Complexity score and level
#[must_use]
pub fn assess_complexity(task_type: TaskType, input: &str, context: &[String]) -> (u32, Complexity) {
    let context_tokens: usize = context.iter().map(|c| estimate_tokens(c)).sum();
    let phrases = COMPLEXITY_PHRASES
        .iter()
        .filter(|re| re.is_match(input))
        .count() as u32;

    let score = length_bucket(input.chars().count())
        + context_bucket(context_tokens)
        + task_type.base_weight()
        + phrases;

    (score, Complexity::from_score(score))
}
