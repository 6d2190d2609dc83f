//! Input and output content screening
//!
//! Input checks run independently and their issues are unioned:
//! length, prompt injection, toxicity, personal data. A high-severity issue,
//! or any medium-or-worse injection issue, blocks the input. Everything else
//! is sanitized and passed on.
//!
//! Output validation redacts anything that would reveal which upstream
//! produced the text, plus credentials, internal addresses and personal data.
//!
//! # Module Structure
//!
//! - `rules`: declarative rule tables (`INJECTION_RULES`, `TOXICITY_RULES`, `PII_RULES`)

pub mod rules;

#[cfg(test)]
mod tests;

use crate::util::truncate_safe;
use regex::Regex;
use rules::{
    CompiledRule, EXTRA_NEWLINES, FICTION, HORIZONTAL_SPACE, INJECTION, INTERNAL_ADDRESS, PII,
    PROFANITY, SECRET, TOXICITY, VENDOR, VIOLENCE, WORD,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Replacement for redacted spans
pub const REDACTED: &str = "[REDACTED]";

/// Neutral name substituted for provider identity
pub const NEUTRAL_IDENTITY: &str = "the assistant";

/// Returned instead of output that fails toxicity screening
pub const OUTPUT_REPLACEMENT: &str =
    "I'm sorry, but I can't share that response. Could you rephrase your request?";

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, never blocks
    Low,
    /// Blocks when the issue is prompt injection
    Medium,
    /// Always blocks
    High,
}

/// What a rule detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Input longer than the configured limit
    Length,
    /// Prompt injection attempt
    PromptInjection,
    /// Toxic or abusive content
    Toxicity,
    /// Personal data
    Pii,
}

/// A single detected issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyIssue {
    /// Issue kind
    pub kind: IssueKind,
    /// Rule identifier
    pub rule: String,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub description: String,
}

impl SafetyIssue {
    fn new(kind: IssueKind, rule: &str, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            rule: rule.to_string(),
            severity,
            description: description.into(),
        }
    }

    fn from_rule(compiled: &CompiledRule) -> Self {
        Self::new(
            compiled.rule.kind,
            compiled.rule.id,
            compiled.rule.severity,
            compiled.rule.description,
        )
    }

    /// Whether this issue alone blocks the input
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::High
            || (self.kind == IssueKind::PromptInjection && self.severity >= Severity::Medium)
    }
}

/// Result of input validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValidation {
    /// No issues at all
    pub is_valid: bool,
    /// Every detected issue
    pub issues: Vec<SafetyIssue>,
    /// Text safe to forward (empty when blocked)
    pub sanitized_text: String,
    /// Highest issue severity
    pub severity: Option<Severity>,
    /// Input must not be forwarded
    pub blocked: bool,
}

impl InputValidation {
    fn clean(text: String) -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            sanitized_text: text,
            severity: None,
            blocked: false,
        }
    }
}

/// Safety filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Enable screening (disabled = pass-through)
    pub enabled: bool,
    /// Maximum input length in characters
    pub max_input_length: usize,
    /// Profanity word ratio above which the issue is medium
    pub profanity_threshold: f64,
    /// Extra provider names and model ids to redact from output
    pub provider_terms: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_input_length: 10_000,
            profanity_threshold: 0.1,
            provider_terms: Vec::new(),
        }
    }
}

/// Content safety filter
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    config: SafetyConfig,
    provider_terms: Option<Regex>,
}

impl SafetyFilter {
    /// Create a filter with the given configuration
    #[must_use]
    pub fn new(config: SafetyConfig) -> Self {
        let provider_terms = build_terms_regex(&config.provider_terms);
        Self {
            config,
            provider_terms,
        }
    }

    /// Add provider names or model ids that must never reach the user
    #[must_use]
    pub fn with_provider_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .provider_terms
            .extend(terms.into_iter().map(Into::into));
        self.provider_terms = build_terms_regex(&self.config.provider_terms);
        self
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Screen user input
    #[must_use]
    pub fn validate_input(&self, text: &str) -> InputValidation {
        if !self.config.enabled {
            return InputValidation::clean(text.to_string());
        }

        let mut issues = Vec::new();

        let length = text.chars().count();
        let too_long = length > self.config.max_input_length;
        if too_long {
            issues.push(SafetyIssue::new(
                IssueKind::Length,
                "max_length",
                Severity::Medium,
                format!(
                    "Input length {} exceeds maximum {}",
                    length, self.config.max_input_length
                ),
            ));
        }

        issues.extend(matching(&INJECTION, text));
        issues.extend(self.toxicity_issues(text));
        issues.extend(matching(&PII, text));

        let severity = issues.iter().map(|i| i.severity).max();
        let blocked = issues.iter().any(SafetyIssue::is_blocking);

        if blocked {
            warn!(
                issues = issues.len(),
                severity = ?severity,
                rules = ?issues.iter().map(|i| i.rule.as_str()).collect::<Vec<_>>(),
                "Input blocked by safety filter"
            );
            return InputValidation {
                is_valid: false,
                issues,
                sanitized_text: String::new(),
                severity,
                blocked: true,
            };
        }

        let limited = if too_long {
            truncate_chars(text, self.config.max_input_length)
        } else {
            text
        };
        let sanitized_text = sanitize(limited);

        if !issues.is_empty() {
            debug!(issues = issues.len(), severity = ?severity, "Input sanitized");
        }

        InputValidation {
            is_valid: issues.is_empty(),
            issues,
            sanitized_text,
            severity,
            blocked: false,
        }
    }

    /// Screen upstream output before it reaches the user
    ///
    /// Disabling the filter skips toxicity screening only. Identity and
    /// leakage redaction always runs.
    #[must_use]
    pub fn validate_output(&self, text: &str) -> String {
        if self.config.enabled
            && self
                .toxicity_issues(text)
                .iter()
                .any(|i| i.severity == Severity::High)
        {
            warn!("Output replaced after toxicity screening");
            return OUTPUT_REPLACEMENT.to_string();
        }

        let scrubbed = SECRET.replace_all(text, REDACTED);
        let scrubbed = match &self.provider_terms {
            Some(terms) => terms.replace_all(&scrubbed, NEUTRAL_IDENTITY).into_owned(),
            None => scrubbed.into_owned(),
        };
        let scrubbed = VENDOR.replace_all(&scrubbed, NEUTRAL_IDENTITY);
        let scrubbed = INTERNAL_ADDRESS.replace_all(&scrubbed, REDACTED);
        redact_pii(&scrubbed)
    }

    /// Redact credentials, internal addresses and personal data from error text
    ///
    /// Provider names are kept; error text goes to logs and metrics, not users.
    #[must_use]
    pub fn scrub_error(&self, text: &str) -> String {
        let scrubbed = SECRET.replace_all(text, REDACTED);
        let scrubbed = INTERNAL_ADDRESS.replace_all(&scrubbed, REDACTED);
        redact_pii(&scrubbed)
    }

    fn toxicity_issues(&self, text: &str) -> Vec<SafetyIssue> {
        let mut issues = matching(&TOXICITY, text);

        let profane = PROFANITY.find_iter(text).count();
        if profane > 0 {
            let words = WORD.find_iter(text).count().max(1);
            #[allow(clippy::cast_precision_loss)]
            let ratio = profane as f64 / words as f64;
            let severity = if ratio > self.config.profanity_threshold {
                Severity::Medium
            } else {
                Severity::Low
            };
            issues.push(SafetyIssue::new(
                IssueKind::Toxicity,
                "profanity_density",
                severity,
                format!("Profanity ratio {ratio:.2}"),
            ));
        }

        if VIOLENCE.is_match(text) && !FICTION.is_match(text) {
            issues.push(SafetyIssue::new(
                IssueKind::Toxicity,
                "violence",
                Severity::Medium,
                "Violent language outside fictional context",
            ));
        }

        issues
    }
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}

fn matching(rules: &[CompiledRule], text: &str) -> Vec<SafetyIssue> {
    rules
        .iter()
        .filter(|r| r.regex.is_match(text))
        .map(SafetyIssue::from_rule)
        .collect()
}

/// Replace every personal data match with `[REDACTED]`
#[must_use]
pub fn redact_pii(text: &str) -> String {
    PII.iter().fold(text.to_string(), |acc, rule| {
        rule.regex.replace_all(&acc, REDACTED).into_owned()
    })
}

/// PII redaction, whitespace normalization, and removal of `<>{}`
fn sanitize(text: &str) -> String {
    let redacted = redact_pii(text);
    let spaced = HORIZONTAL_SPACE.replace_all(&redacted, " ");
    let spaced = EXTRA_NEWLINES.replace_all(&spaced, "\n\n");
    spaced
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '{' | '}'))
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => truncate_safe(text, idx),
        None => text,
    }
}

/// Anchor a term on word boundaries at whichever ends are word characters
fn bounded(escaped: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let start = if is_word(escaped.chars().next()) { r"\b" } else { "" };
    let end = if is_word(escaped.chars().last()) { r"\b" } else { "" };
    format!("{start}(?:{escaped}){end}")
}

/// Case-insensitive alternation of configured terms, longest first
fn build_terms_regex(terms: &[String]) -> Option<Regex> {
    let mut escaped: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return None;
    }
    escaped.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    escaped.dedup();

    let alternation: Vec<String> = escaped.iter().map(|t| bounded(t)).collect();
    let pattern = format!("(?i){}", alternation.join("|"));
    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(error = %e, "Failed to build provider term pattern");
            None
        }
    }
}
