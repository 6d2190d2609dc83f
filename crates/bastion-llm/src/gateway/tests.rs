use super::*;
use crate::message::Message;
use crate::providers::mock::{MockProvider, MockReply};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct RecordingObserver {
    outcomes: Mutex<Vec<RequestOutcome>>,
}

#[async_trait::async_trait]
impl AttemptObserver for RecordingObserver {
    async fn on_attempt(&self, outcome: &RequestOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

fn request() -> CompletionRequest {
    CompletionRequest::new(vec![Message::user("What is the weather like?")])
}

fn descriptor(name: &str, priority: u32) -> ProviderDescriptor {
    ProviderDescriptor::new(name, format!("{name}-model"))
        .with_priority(priority)
        .with_cost_per_1k(0.002)
}

struct Fixture {
    gateway: Gateway,
    a: Arc<MockProvider>,
    b: Arc<MockProvider>,
    observer: Arc<RecordingObserver>,
}

fn fixture(a: MockProvider, b: MockProvider) -> Fixture {
    let a = Arc::new(a);
    let b = Arc::new(b);
    let observer = Arc::new(RecordingObserver::default());
    let gateway = Gateway::builder(GatewayConfig::default())
        .provider(descriptor("b", 2), b.clone())
        .provider(descriptor("a", 1), a.clone())
        .observer(observer.clone())
        .build();
    Fixture {
        gateway,
        a,
        b,
        observer,
    }
}

#[tokio::test]
async fn test_priority_order_first_success() {
    let f = fixture(MockProvider::new("a"), MockProvider::new("b"));

    let response = f.gateway.call(request(), &CallOptions::default()).await.unwrap();

    assert_eq!(response.provider_used, "a");
    assert_eq!(response.content, "mock response");
    assert_eq!(response.tokens_used, 15);
    assert!((response.cost - 0.00003).abs() < 1e-12);
    assert_eq!(f.a.call_count(), 1);
    assert_eq!(f.b.call_count(), 0);
    // upstream receives the descriptor's model
    assert_eq!(f.a.last_request().unwrap().model, "a-model");
}

#[tokio::test]
async fn test_failover_marks_failed_provider_unhealthy() {
    let f = fixture(MockProvider::failing("a"), MockProvider::new("b"));

    let response = f.gateway.call(request(), &CallOptions::default()).await.unwrap();
    assert_eq!(response.provider_used, "b");

    let status = f.gateway.provider_status();
    let a = status.iter().find(|s| s.descriptor.name == "a").unwrap();
    assert!(!a.healthy);
    assert!(a.cooldown_remaining_secs.is_some());

    let outcomes = f.observer.outcomes.lock().unwrap().clone();
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].success);
    assert_eq!(outcomes[0].provider, "a");
    assert!(outcomes[0].error.is_some());
    assert!(outcomes[1].success);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_skips_then_retries_first() {
    let a = MockProvider::new("a");
    a.push_reply(MockReply::Fail("temporary outage".to_string()));
    let f = fixture(a, MockProvider::new("b"));

    let first = f.gateway.call(request(), &CallOptions::default()).await.unwrap();
    assert_eq!(first.provider_used, "b");
    assert_eq!(f.a.call_count(), 1);

    // within cooldown: a is not attempted
    tokio::time::advance(Duration::from_secs(60)).await;
    let second = f.gateway.call(request(), &CallOptions::default()).await.unwrap();
    assert_eq!(second.provider_used, "b");
    assert_eq!(f.a.call_count(), 1);
    assert_eq!(f.gateway.available_providers().len(), 1);

    // after cooldown: a is re-enabled and tried first
    tokio::time::advance(Duration::from_secs(241)).await;
    let third = f.gateway.call(request(), &CallOptions::default()).await.unwrap();
    assert_eq!(third.provider_used, "a");
    assert_eq!(f.a.call_count(), 2);
    assert_eq!(f.b.call_count(), 2);
}

#[tokio::test]
async fn test_all_providers_fail() {
    let f = fixture(MockProvider::failing("a"), MockProvider::failing("b"));

    let err = f
        .gateway
        .call(request(), &CallOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::AllProvidersExhausted { attempted } => {
            assert_eq!(attempted, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(f.a.call_count(), 1);
    assert_eq!(f.b.call_count(), 1);
    assert!(f.gateway.available_providers().is_empty());
}

#[tokio::test]
async fn test_exhausted_when_none_eligible() {
    let f = fixture(MockProvider::failing("a"), MockProvider::failing("b"));
    let _ = f.gateway.call(request(), &CallOptions::default()).await;

    let err = f
        .gateway
        .call(request(), &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AllProvidersExhausted { ref attempted } if attempted.is_empty()));
    assert_eq!(f.a.call_count(), 1);
}

#[tokio::test]
async fn test_preferred_order_moves_named_first() {
    let f = fixture(MockProvider::new("a"), MockProvider::new("b"));

    let response = f
        .gateway
        .call(request(), &CallOptions::prefer(["b", "unknown"]))
        .await
        .unwrap();
    assert_eq!(response.provider_used, "b");
    assert_eq!(f.a.call_count(), 0);
}

#[tokio::test]
async fn test_oversized_request_skips_without_marking_unhealthy() {
    let small = Arc::new(MockProvider::new("small"));
    let large = Arc::new(MockProvider::new("large"));
    let gateway = Gateway::builder(GatewayConfig::default())
        .provider(
            ProviderDescriptor::new("small", "s").with_priority(1).with_max_input_tokens(10),
            small.clone(),
        )
        .provider(
            ProviderDescriptor::new("large", "l").with_priority(2),
            large.clone(),
        )
        .build();

    let big = CompletionRequest::new(vec![Message::user("x".repeat(400))]);
    let response = gateway.call(big, &CallOptions::default()).await.unwrap();

    assert_eq!(response.provider_used, "large");
    assert_eq!(small.call_count(), 0);
    assert!(gateway
        .provider_status()
        .iter()
        .all(|s| s.healthy));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_failure() {
    let slow = MockProvider::new("a").with_delay(Duration::from_secs(120));
    let f = fixture(slow, MockProvider::new("b"));

    let response = f.gateway.call(request(), &CallOptions::default()).await.unwrap();
    assert_eq!(response.provider_used, "b");

    let outcomes = f.observer.outcomes.lock().unwrap().clone();
    assert!(!outcomes[0].success);
    assert!(outcomes[0].duration_ms >= 30_000);
    assert!(outcomes[0].error.as_deref().unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_missing_usage_is_counted_locally() {
    let f = fixture(
        MockProvider::new("a").with_usage(None),
        MockProvider::new("b"),
    );
    let response = f.gateway.call(request(), &CallOptions::default()).await.unwrap();
    assert!(response.tokens_used > 0);
}

#[tokio::test]
async fn test_error_text_is_scrubbed() {
    let a = MockProvider::new("a");
    a.push_reply(MockReply::Fail(
        "bad key sk-abcdefghijklmnop1234 at 10.0.0.5".to_string(),
    ));
    let f = fixture(a, MockProvider::new("b"));
    f.gateway.call(request(), &CallOptions::default()).await.unwrap();

    let outcomes = f.observer.outcomes.lock().unwrap().clone();
    let error = outcomes[0].error.clone().unwrap();
    assert!(!error.contains("sk-abcdefghijklmnop1234"));
    assert!(!error.contains("10.0.0.5"));
}

#[test]
fn test_identity_terms_cover_names_and_models() {
    let f = fixture(MockProvider::new("a"), MockProvider::new("b"));
    let terms = f.gateway.identity_terms();
    assert!(terms.contains(&"a".to_string()));
    assert!(terms.contains(&"a-model".to_string()));
    assert!(terms.contains(&"b-model".to_string()));
}

#[test]
fn test_descriptor_cost_and_capability() {
    let d = ProviderDescriptor::new("x", "m")
        .with_cost_per_1k(0.5)
        .with_capability(42);
    assert!((d.cost_for(2000) - 1.0).abs() < f64::EPSILON);
    assert_eq!(d.capability, 10);
}

#[test]
fn test_descriptor_deserializes_with_defaults() {
    let d: ProviderDescriptor =
        serde_json::from_value(serde_json::json!({"name": "p", "model": "m"})).unwrap();
    assert_eq!(d.priority, 0);
    assert_eq!(d.max_input_tokens, crate::token::DEFAULT_TOKEN_BUDGET);
    assert_eq!(d.capability, 5);
}
