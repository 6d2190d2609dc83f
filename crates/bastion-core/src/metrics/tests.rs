use super::*;
use crate::store::mock::failing_store;
use crate::store::{KvStore, MemoryStore, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn collector() -> (Arc<MemoryStore>, MetricsCollector) {
    let store = Arc::new(MemoryStore::new());
    let collector = MetricsCollector::new(store.clone(), MetricsConfig::default());
    (store, collector)
}

fn ok(provider: &str, tokens: u64, duration_ms: u64) -> RequestOutcome {
    RequestOutcome::success(provider, "model", tokens, tokens as f64 / 1000.0 * 0.01, duration_ms)
}

fn failed(provider: &str) -> RequestOutcome {
    RequestOutcome::failure(provider, "model", 120, "rate limit exceeded")
}

#[test]
fn test_hour_key_format() {
    let ts = DateTime::parse_from_rfc3339("2024-03-07T09:41:00Z")
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(hour_key(ts), "2024030709");
}

#[tokio::test]
async fn test_record_updates_global_and_provider_buckets() {
    let (store, collector) = collector();
    let outcome = ok("openai", 1_500, 800);
    collector.record(&outcome).await;
    collector.record(&failed("openai")).await;
    collector.record(&ok("groq", 500, 200)).await;

    let hour = hour_key(outcome.timestamp);
    let global: MetricsBucket = get_json(store.as_ref(), &format!("metrics:{hour}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(global.requests, 3);
    assert_eq!(global.tokens, 2_000);
    assert_eq!(global.errors, 1);
    assert_eq!(global.duration_ms_total, 1_120);

    let openai: MetricsBucket =
        get_json(store.as_ref(), &format!("metrics:{hour}:provider:openai"))
            .await
            .unwrap()
            .unwrap();
    assert_eq!(openai.requests, 2);
    assert_eq!(openai.errors, 1);
}

#[tokio::test]
async fn test_system_metrics_aggregates_window() {
    let (_store, collector) = collector();
    for _ in 0..3 {
        collector.record(&ok("openai", 1_000, 300)).await;
    }
    collector.record(&failed("anthropic")).await;

    let metrics = collector.system_metrics(24).await;
    assert_eq!(metrics.window_hours, 24);
    assert_eq!(metrics.total_requests, 4);
    assert_eq!(metrics.total_tokens, 3_000);
    assert!((metrics.error_rate - 0.25).abs() < 1e-9);
    assert!((metrics.avg_duration_ms - 255.0).abs() < 1e-9);
    assert_eq!(metrics.hourly.len(), 1);

    let openai = &metrics.providers["openai"];
    assert_eq!(openai.requests, 3);
    assert!((openai.avg_duration_ms - 300.0).abs() < 1e-9);
    assert_eq!(metrics.providers["anthropic"].errors, 1);
}

#[tokio::test]
async fn test_system_metrics_window_is_clamped() {
    let (_store, collector) = collector();
    assert_eq!(collector.system_metrics(0).await.window_hours, 1);
    assert_eq!(collector.system_metrics(10_000).await.window_hours, MAX_WINDOW_HOURS);
}

#[tokio::test]
async fn test_old_buckets_fall_outside_window() {
    let (_store, collector) = collector();
    let mut old = ok("openai", 100, 10);
    old.timestamp = Utc::now() - ChronoDuration::hours(5);
    collector.record(&old).await;
    collector.record(&ok("openai", 100, 10)).await;

    assert_eq!(collector.system_metrics(1).await.total_requests, 1);
    assert_eq!(collector.system_metrics(6).await.total_requests, 2);
}

#[tokio::test]
async fn test_slow_response_alert_and_resolution() {
    let (_store, collector) = collector();
    collector.record(&ok("anthropic", 100, 31_000)).await;

    let alerts = collector.active_alerts().await;
    let slow: Vec<&Alert> = alerts
        .iter()
        .filter(|a| a.kind == AlertKind::SlowResponse)
        .collect();
    assert_eq!(slow.len(), 1);
    assert!(!slow[0].resolved);
    assert_eq!(slow[0].severity, AlertSeverity::Medium);
    assert_eq!(slow[0].provider.as_deref(), Some("anthropic"));

    let id = slow[0].id.clone();
    assert!(collector.resolve_alert(&id).await);
    assert!(collector
        .active_alerts()
        .await
        .iter()
        .all(|a| a.kind != AlertKind::SlowResponse));
}

#[tokio::test]
async fn test_slow_alerts_are_per_occurrence() {
    let (_store, collector) = collector();
    collector.record(&ok("anthropic", 100, 31_000)).await;
    collector.record(&ok("anthropic", 100, 65_000)).await;

    let alerts = collector.active_alerts().await;
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().any(|a| a.severity == AlertSeverity::High));
}

#[tokio::test]
async fn test_fast_response_raises_nothing() {
    let (_store, collector) = collector();
    collector.record(&ok("openai", 100, 30_000)).await;
    assert!(collector.active_alerts().await.is_empty());
}

#[tokio::test]
async fn test_provider_down_deduplicated_per_hour() {
    let (_store, collector) = collector();
    collector.record(&failed("groq")).await;
    collector.record(&failed("groq")).await;
    collector.record(&failed("openai")).await;

    let down: Vec<Alert> = collector
        .active_alerts()
        .await
        .into_iter()
        .filter(|a| a.kind == AlertKind::ProviderDown)
        .collect();
    assert_eq!(down.len(), 2);
    assert!(down.iter().any(|a| a.id.starts_with("provider-down:groq:")));
}

#[tokio::test]
async fn test_resolved_hourly_alert_is_not_recreated() {
    let (_store, collector) = collector();
    collector.record(&failed("groq")).await;
    let id = collector.active_alerts().await[0].id.clone();
    assert!(collector.resolve_alert(&id).await);

    collector.record(&failed("groq")).await;
    assert!(collector.active_alerts().await.is_empty());
}

#[tokio::test]
async fn test_token_and_cost_limits() {
    let store = Arc::new(MemoryStore::new());
    let config = MetricsConfig {
        hourly_token_limit: 1_000,
        hourly_cost_limit: 0.5,
        ..MetricsConfig::default()
    };
    let collector = MetricsCollector::new(store, config);

    let mut outcome = ok("openai", 800, 100);
    outcome.cost = 0.3;
    collector.record(&outcome).await;
    assert!(collector.active_alerts().await.is_empty());

    collector.record(&outcome).await;
    collector.record(&outcome).await;

    let alerts = collector.active_alerts().await;
    let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
    assert_eq!(alerts.len(), 2);
    assert!(kinds.contains(&AlertKind::TokenLimit));
    assert!(kinds.contains(&AlertKind::CostThreshold));
}

#[tokio::test]
async fn test_error_rate_needs_minimum_requests() {
    let (_store, collector) = collector();
    let high_rate = |a: &Alert| a.kind == AlertKind::HighErrorRate;

    // 5 of 9 failing is a high rate, but below the request minimum
    for _ in 0..4 {
        collector.record(&ok("openai", 10, 10)).await;
    }
    for _ in 0..5 {
        collector.record(&failed("anthropic")).await;
    }
    assert!(!collector.active_alerts().await.iter().any(high_rate));

    collector.record(&failed("anthropic")).await;
    let alerts = collector.active_alerts().await;
    let alert = alerts.iter().find(|a| high_rate(a)).unwrap();
    assert_eq!(alert.severity, AlertSeverity::Critical);
}

#[tokio::test]
async fn test_resolve_unknown_alert() {
    let (_store, collector) = collector();
    assert!(!collector.resolve_alert("nope").await);
}

#[tokio::test]
async fn test_turn_failures_counted() {
    let (_store, collector) = collector();
    collector.record_turn_failure().await;
    collector.record_turn_failure().await;

    let metrics = collector.system_metrics(1).await;
    assert_eq!(metrics.turn_failures, 2);
    assert_eq!(metrics.total_requests, 0);
}

#[tokio::test]
async fn test_observer_records_attempts() {
    let (store, collector) = collector();
    let observer: &dyn AttemptObserver = &collector;
    observer.on_attempt(&ok("openai", 10, 10)).await;

    assert_eq!(store.keys("metrics:").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_store_failures_are_swallowed() {
    let collector = MetricsCollector::new(Arc::new(failing_store()), MetricsConfig::default());
    collector.record(&ok("openai", 100, 40_000)).await;
    collector.record_turn_failure().await;

    assert!(collector.active_alerts().await.is_empty());
    assert!(!collector.resolve_alert("x").await);
    assert_eq!(collector.system_metrics(3).await.total_requests, 0);
}

/// Memory store whose alert reads wait for a permit
struct GatedAlertStore {
    inner: MemoryStore,
    gate: Semaphore,
}

#[async_trait]
impl KvStore for GatedAlertStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if key.starts_with("alert:") {
            let _permit = self.gate.acquire().await;
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.keys(prefix).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_alert_checks_do_not_block_bucket_updates() {
    let store = Arc::new(GatedAlertStore {
        inner: MemoryStore::new(),
        gate: Semaphore::new(0),
    });
    let collector = Arc::new(MetricsCollector::new(store.clone(), MetricsConfig::default()));

    // stalls inside the provider-down check
    let stalled = {
        let collector = collector.clone();
        tokio::spawn(async move { collector.record(&failed("openai")).await })
    };
    tokio::task::yield_now().await;

    let quick = tokio::time::timeout(
        Duration::from_secs(5),
        collector.record(&ok("groq", 100, 50)),
    )
    .await;
    assert!(quick.is_ok(), "bucket update waited on an alert check");

    store.gate.add_permits(100);
    stalled.await.unwrap();

    let metrics = collector.system_metrics(1).await;
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(collector.active_alerts().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_failures_raise_one_alert() {
    let (_store, collector) = collector();
    let collector = Arc::new(collector);

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let collector = collector.clone();
            tokio::spawn(async move { collector.record(&failed("openai")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let metrics = collector.system_metrics(1).await;
    assert_eq!(metrics.total_requests, 20);
    assert_eq!(metrics.providers["openai"].errors, 20);
    let down: Vec<_> = collector
        .active_alerts()
        .await
        .into_iter()
        .filter(|a| a.kind == AlertKind::ProviderDown)
        .collect();
    assert_eq!(down.len(), 1);
}
