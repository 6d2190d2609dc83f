//! Metrics & alerting
//!
//! Upstream attempts arrive through [`AttemptObserver`] and are folded into
//! hourly buckets (one global, one per provider). After each record the
//! current hour is checked against the configured thresholds.
//!
//! Store keys:
//!
//! - `metrics:{YYYYMMDDHH}`: global bucket
//! - `metrics:{YYYYMMDDHH}:provider:{name}`: per-provider bucket
//! - `alert:{id}`: alerts
//!
//! Every store failure is logged and swallowed; metrics never fail a turn.
//!
//! # Module Structure
//!
//! - `types`: buckets, snapshots, alerts and thresholds
//! - `alerts`: threshold checks, alert listing and resolution

mod alerts;
mod types;

#[cfg(test)]
mod tests;

pub use types::{
    Alert, AlertKind, AlertSeverity, MetricsBucket, MetricsConfig, ProviderMetrics, SystemMetrics,
};

use crate::store::{get_json, set_json, SharedStore, StoreResult};
use async_trait::async_trait;
use bastion_llm::{AttemptObserver, RequestOutcome};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Longest window `system_metrics` will read; older buckets have expired
pub const MAX_WINDOW_HOURS: u32 = 7 * 24;

/// Hour bucket key for a timestamp
#[must_use]
pub fn hour_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d%H").to_string()
}

fn global_key(hour: &str) -> String {
    format!("metrics:{}", hour)
}

fn provider_prefix(hour: &str) -> String {
    format!("metrics:{}:provider:", hour)
}

fn provider_key(hour: &str, provider: &str) -> String {
    format!("{}{}", provider_prefix(hour), provider)
}

/// Collects attempt outcomes and raises alerts
pub struct MetricsCollector {
    store: SharedStore,
    config: MetricsConfig,
    /// Serializes read-modify-write of buckets within this process
    write_lock: Mutex<()>,
}

impl MetricsCollector {
    /// Create a collector over `store`
    #[must_use]
    pub fn new(store: SharedStore, config: MetricsConfig) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Thresholds in use
    #[must_use]
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    fn bucket_ttl(&self) -> Option<Duration> {
        Some(Duration::from_secs(self.config.bucket_ttl_secs))
    }

    async fn update_bucket<F>(&self, key: &str, hour: &str, update: F) -> StoreResult<MetricsBucket>
    where
        F: FnOnce(&mut MetricsBucket) + Send,
    {
        let mut bucket: MetricsBucket = get_json(self.store.as_ref(), key)
            .await?
            .unwrap_or_else(|| MetricsBucket::new(hour));
        update(&mut bucket);
        set_json(self.store.as_ref(), key, &bucket, self.bucket_ttl()).await?;
        Ok(bucket)
    }

    /// Fold one attempt into its hour and check thresholds
    pub async fn record(&self, outcome: &RequestOutcome) {
        let hour = hour_key(outcome.timestamp);
        let guard = self.write_lock.lock().await;

        let global = match self
            .update_bucket(&global_key(&hour), &hour, |b| b.apply(outcome))
            .await
        {
            Ok(bucket) => bucket,
            Err(e) => {
                warn!(error = %e, "Failed to record metrics");
                return;
            }
        };

        if !outcome.provider.is_empty() {
            if let Err(e) = self
                .update_bucket(&provider_key(&hour, &outcome.provider), &hour, |b| {
                    b.apply(outcome)
                })
                .await
            {
                warn!(provider = %outcome.provider, error = %e, "Failed to record provider metrics");
            }
        }

        debug!(
            provider = %outcome.provider,
            success = outcome.success,
            duration_ms = outcome.duration_ms,
            tokens = outcome.tokens,
            "Attempt recorded"
        );
        drop(guard);

        // Alert writes are idempotent per id, so they run outside the bucket lock
        self.check_thresholds(outcome, &hour, &global).await;
    }

    /// Count a turn that ended without a usable reply
    pub async fn record_turn_failure(&self) {
        let hour = hour_key(Utc::now());
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self
            .update_bucket(&global_key(&hour), &hour, |b| b.turn_failures += 1)
            .await
        {
            warn!(error = %e, "Failed to record turn failure");
        }
    }

    /// Aggregate the last `window_hours` hours, current hour included
    ///
    /// The window is clamped to `1..=MAX_WINDOW_HOURS`. Unreadable buckets
    /// are skipped.
    pub async fn system_metrics(&self, window_hours: u32) -> SystemMetrics {
        let window = window_hours.clamp(1, MAX_WINDOW_HOURS);
        let now = Utc::now();

        let mut hourly = Vec::new();
        let mut providers: BTreeMap<String, MetricsBucket> = BTreeMap::new();

        for offset in (0..window).rev() {
            let hour = hour_key(now - ChronoDuration::hours(i64::from(offset)));

            match get_json::<MetricsBucket>(self.store.as_ref(), &global_key(&hour)).await {
                Ok(Some(bucket)) => hourly.push(bucket),
                Ok(None) => {}
                Err(e) => warn!(hour = %hour, error = %e, "Skipping unreadable metrics bucket"),
            }

            let prefix = provider_prefix(&hour);
            let keys = match self.store.keys(&prefix).await {
                Ok(keys) => keys,
                Err(e) => {
                    warn!(hour = %hour, error = %e, "Failed to list provider buckets");
                    continue;
                }
            };
            for key in keys {
                let Some(name) = key.strip_prefix(&prefix) else {
                    continue;
                };
                match get_json::<MetricsBucket>(self.store.as_ref(), &key).await {
                    Ok(Some(bucket)) => types::merge_into(&mut providers, name, &bucket),
                    Ok(None) => {}
                    Err(e) => warn!(key = %key, error = %e, "Skipping unreadable provider bucket"),
                }
            }
        }

        SystemMetrics::from_parts(window, hourly, providers)
    }
}

#[async_trait]
impl AttemptObserver for MetricsCollector {
    async fn on_attempt(&self, outcome: &RequestOutcome) {
        self.record(outcome).await;
    }
}
