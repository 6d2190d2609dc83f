use super::types::{Alert, AlertKind, AlertSeverity, MetricsBucket};
use super::MetricsCollector;
use crate::store::{get_json, set_json};
use bastion_llm::RequestOutcome;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

const ALERT_PREFIX: &str = "alert:";

fn alert_key(id: &str) -> String {
    format!("{}{}", ALERT_PREFIX, id)
}

impl MetricsCollector {
    fn alert_ttl(&self) -> Duration {
        Duration::from_secs(self.config.alert_ttl_secs)
    }

    /// Compare the outcome and its hour against every threshold
    pub(super) async fn check_thresholds(
        &self,
        outcome: &RequestOutcome,
        hour: &str,
        global: &MetricsBucket,
    ) {
        let config = &self.config;

        if outcome.duration_ms > config.slow_response_ms {
            let severity = if outcome.duration_ms > config.slow_response_ms * 2 {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            let alert = Alert::new(
                format!("{}:{}", AlertKind::SlowResponse, uuid::Uuid::new_v4()),
                AlertKind::SlowResponse,
                severity,
                format!(
                    "{} responded in {}ms (threshold {}ms)",
                    outcome.provider, outcome.duration_ms, config.slow_response_ms
                ),
            )
            .with_provider(&outcome.provider);
            self.raise(alert).await;
        }

        if global.tokens > config.hourly_token_limit {
            self.raise(Alert::new(
                format!("{}:{}", AlertKind::TokenLimit, hour),
                AlertKind::TokenLimit,
                AlertSeverity::High,
                format!(
                    "{} tokens used this hour (limit {})",
                    global.tokens, config.hourly_token_limit
                ),
            ))
            .await;
        }

        if global.cost > config.hourly_cost_limit {
            self.raise(Alert::new(
                format!("{}:{}", AlertKind::CostThreshold, hour),
                AlertKind::CostThreshold,
                AlertSeverity::High,
                format!(
                    "estimated cost {:.2} this hour (limit {:.2})",
                    global.cost, config.hourly_cost_limit
                ),
            ))
            .await;
        }

        let error_rate = global.error_rate();
        if global.requests >= config.min_requests_for_error_rate
            && error_rate > config.error_rate_threshold
        {
            let severity = if error_rate >= 0.5 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::High
            };
            self.raise(Alert::new(
                format!("{}:{}", AlertKind::HighErrorRate, hour),
                AlertKind::HighErrorRate,
                severity,
                format!(
                    "error rate {:.0}% over {} requests this hour",
                    error_rate * 100.0,
                    global.requests
                ),
            ))
            .await;
        }

        if !outcome.success && !outcome.provider.is_empty() {
            let reason = outcome.error.as_deref().unwrap_or("unknown error");
            self.raise(
                Alert::new(
                    format!("{}:{}:{}", AlertKind::ProviderDown, outcome.provider, hour),
                    AlertKind::ProviderDown,
                    AlertSeverity::High,
                    format!("{} failed: {}", outcome.provider, reason),
                )
                .with_provider(&outcome.provider),
            )
            .await;
        }
    }

    /// Store an alert unless one with the same id already exists
    pub(super) async fn raise(&self, alert: Alert) {
        let key = alert_key(&alert.id);
        match self.store.get(&key).await {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Failed to check for existing alert");
                return;
            }
        }

        if let Err(e) = set_json(self.store.as_ref(), &key, &alert, Some(self.alert_ttl())).await {
            warn!(alert_id = %alert.id, error = %e, "Failed to store alert");
            return;
        }

        warn!(
            alert_id = %alert.id,
            kind = %alert.kind,
            severity = ?alert.severity,
            message = %alert.message,
            "Alert raised"
        );
    }

    /// Unresolved alerts, newest first
    pub async fn active_alerts(&self) -> Vec<Alert> {
        let keys = match self.store.keys(ALERT_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list alerts");
                return Vec::new();
            }
        };

        let mut alerts = Vec::new();
        for key in keys {
            match get_json::<Alert>(self.store.as_ref(), &key).await {
                Ok(Some(alert)) if !alert.resolved => alerts.push(alert),
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable alert"),
            }
        }

        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts
    }

    /// Mark an alert resolved; returns whether it was found and updated
    ///
    /// The alert keeps its original expiry.
    pub async fn resolve_alert(&self, id: &str) -> bool {
        let key = alert_key(id);
        let mut alert: Alert = match get_json(self.store.as_ref(), &key).await {
            Ok(Some(alert)) => alert,
            Ok(None) => return false,
            Err(e) => {
                warn!(alert_id = %id, error = %e, "Failed to load alert");
                return false;
            }
        };

        if alert.resolved {
            return true;
        }
        alert.resolved = true;

        let age = Utc::now()
            .signed_duration_since(alert.timestamp)
            .to_std()
            .unwrap_or_default();
        let remaining = self
            .alert_ttl()
            .saturating_sub(age)
            .max(Duration::from_secs(1));

        match set_json(self.store.as_ref(), &key, &alert, Some(remaining)).await {
            Ok(()) => {
                info!(alert_id = %id, "Alert resolved");
                true
            }
            Err(e) => {
                warn!(alert_id = %id, error = %e, "Failed to resolve alert");
                false
            }
        }
    }
}
