//! Metrics and alert data types

use bastion_llm::RequestOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Alerting thresholds and retention
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Attempts slower than this raise a slow-response alert
    pub slow_response_ms: u64,
    /// Hourly token ceiling
    pub hourly_token_limit: u64,
    /// Hourly cost ceiling
    pub hourly_cost_limit: f64,
    /// Error rate above which high-error-rate fires
    pub error_rate_threshold: f64,
    /// Requests needed in the hour before the error rate is judged
    pub min_requests_for_error_rate: u64,
    /// Bucket retention
    pub bucket_ttl_secs: u64,
    /// Alert retention
    pub alert_ttl_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            slow_response_ms: 30_000,
            hourly_token_limit: 1_000_000,
            hourly_cost_limit: 50.0,
            error_rate_threshold: 0.25,
            min_requests_for_error_rate: 10,
            bucket_ttl_secs: 7 * 24 * 3600,
            alert_ttl_secs: 24 * 3600,
        }
    }
}

/// Counters for one hour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBucket {
    /// Hour key (`YYYYMMDDHH`, UTC)
    pub hour: String,
    /// Upstream attempts
    pub requests: u64,
    /// Tokens consumed
    pub tokens: u64,
    /// Estimated cost
    pub cost: f64,
    /// Sum of attempt durations
    pub duration_ms_total: u64,
    /// Failed attempts
    pub errors: u64,
    /// Turns that ended without a usable reply
    #[serde(default)]
    pub turn_failures: u64,
}

impl MetricsBucket {
    /// Empty bucket for an hour
    #[must_use]
    pub fn new(hour: impl Into<String>) -> Self {
        Self {
            hour: hour.into(),
            ..Self::default()
        }
    }

    /// Fold one attempt into the counters
    pub fn apply(&mut self, outcome: &RequestOutcome) {
        self.requests += 1;
        self.tokens += outcome.tokens;
        self.cost += outcome.cost;
        self.duration_ms_total += outcome.duration_ms;
        if !outcome.success {
            self.errors += 1;
        }
    }

    /// Failed attempts over attempts; zero when idle
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        ratio(self.errors, self.requests)
    }

    fn merge(&mut self, other: &MetricsBucket) {
        self.requests += other.requests;
        self.tokens += other.tokens;
        self.cost += other.cost;
        self.duration_ms_total += other.duration_ms_total;
        self.errors += other.errors;
        self.turn_failures += other.turn_failures;
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Aggregate for one provider over the window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    /// Upstream attempts
    pub requests: u64,
    /// Tokens consumed
    pub tokens: u64,
    /// Estimated cost
    pub cost: f64,
    /// Failed attempts
    pub errors: u64,
    /// Mean attempt duration
    pub avg_duration_ms: f64,
    /// Failed over total
    pub error_rate: f64,
}

impl ProviderMetrics {
    pub(crate) fn from_bucket(bucket: &MetricsBucket) -> Self {
        Self {
            requests: bucket.requests,
            tokens: bucket.tokens,
            cost: bucket.cost,
            errors: bucket.errors,
            avg_duration_ms: ratio(bucket.duration_ms_total, bucket.requests),
            error_rate: bucket.error_rate(),
        }
    }
}

/// Snapshot over a window of hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Hours covered, current hour included
    pub window_hours: u32,
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Upstream attempts
    pub total_requests: u64,
    /// Tokens consumed
    pub total_tokens: u64,
    /// Estimated cost
    pub total_cost: f64,
    /// Mean attempt duration
    pub avg_duration_ms: f64,
    /// Failed over total
    pub error_rate: f64,
    /// Turns that ended without a usable reply
    pub turn_failures: u64,
    /// Per-provider aggregates
    pub providers: BTreeMap<String, ProviderMetrics>,
    /// Global buckets, oldest first; hours without traffic are omitted
    pub hourly: Vec<MetricsBucket>,
}

impl SystemMetrics {
    pub(crate) fn from_parts(
        window_hours: u32,
        hourly: Vec<MetricsBucket>,
        provider_totals: BTreeMap<String, MetricsBucket>,
    ) -> Self {
        let mut total = MetricsBucket::default();
        for bucket in &hourly {
            total.merge(bucket);
        }

        Self {
            window_hours,
            generated_at: Utc::now(),
            total_requests: total.requests,
            total_tokens: total.tokens,
            total_cost: total.cost,
            avg_duration_ms: ratio(total.duration_ms_total, total.requests),
            error_rate: total.error_rate(),
            turn_failures: total.turn_failures,
            providers: provider_totals
                .iter()
                .map(|(name, bucket)| (name.clone(), ProviderMetrics::from_bucket(bucket)))
                .collect(),
            hourly,
        }
    }
}

pub(crate) fn merge_into(
    totals: &mut BTreeMap<String, MetricsBucket>,
    name: &str,
    bucket: &MetricsBucket,
) {
    totals.entry(name.to_string()).or_default().merge(bucket);
}

/// Alert categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    /// Single attempt over the latency threshold
    SlowResponse,
    /// Hourly error rate over threshold
    HighErrorRate,
    /// Hourly tokens over limit
    TokenLimit,
    /// Hourly cost over limit
    CostThreshold,
    /// A provider failed an attempt
    ProviderDown,
}

impl AlertKind {
    /// Id segment for this kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlowResponse => "slow-response",
            Self::HighErrorRate => "high-error-rate",
            Self::TokenLimit => "token-limit",
            Self::CostThreshold => "cost-threshold",
            Self::ProviderDown => "provider-down",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Worth a look
    Medium,
    /// Needs attention
    High,
    /// Needs attention now
    Critical,
}

/// Operational alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert id; hourly kinds reuse the id within the hour
    pub id: String,
    /// Kind
    pub kind: AlertKind,
    /// Severity
    pub severity: AlertSeverity,
    /// Operator-facing description
    pub message: String,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
    /// Whether an operator resolved it
    pub resolved: bool,
    /// Provider concerned, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Alert {
    /// Unresolved alert raised now
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: AlertKind,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            resolved: false,
            provider: None,
        }
    }

    /// Attach the provider concerned
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}
