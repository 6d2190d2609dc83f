//! Content-addressed response cache
//!
//! Entries live under `cache:{category}:{fingerprint}`. Every store failure
//! degrades to a miss or a no-op; the cache never fails a turn.

use crate::store::{get_json, set_json, SharedStore};
use bastion_llm::Message;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// What a cached payload is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Upstream provider reply
    ProviderResponse,
    /// Fetched resource text
    ResourceContent,
    /// Generated report section
    ReportSection,
    /// Anything else
    Generic,
}

impl CacheCategory {
    /// Key segment for this category
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderResponse => "provider_response",
            Self::ResourceContent => "resource_content",
            Self::ReportSection => "report_section",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category TTLs in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the facade consults the cache at all
    pub enabled: bool,
    /// `provider_response` TTL
    pub provider_response_ttl_secs: u64,
    /// `resource_content` TTL
    pub resource_content_ttl_secs: u64,
    /// `report_section` TTL
    pub report_section_ttl_secs: u64,
    /// `generic` TTL
    pub generic_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_response_ttl_secs: 24 * 3600,
            resource_content_ttl_secs: 6 * 3600,
            report_section_ttl_secs: 2 * 3600,
            generic_ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    /// TTL for a category
    #[must_use]
    pub fn ttl(&self, category: CacheCategory) -> Duration {
        let secs = match category {
            CacheCategory::ProviderResponse => self.provider_response_ttl_secs,
            CacheCategory::ResourceContent => self.resource_content_ttl_secs,
            CacheCategory::ReportSection => self.report_section_ttl_secs,
            CacheCategory::Generic => self.generic_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Stored cache record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached payload
    pub payload: Value,
    /// Category the entry was stored under
    pub category: CacheCategory,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        chrono::Duration::from_std(ttl).is_ok_and(|ttl| age >= ttl)
    }
}

/// Lower-case, trim and collapse whitespace runs to one space
#[must_use]
pub fn normalize(text: &str) -> String {
    WHITESPACE_RUN
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

#[derive(Serialize)]
struct FingerprintMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    messages: Vec<FingerprintMessage<'a>>,
    model: String,
}

/// SHA-256 hex digest identifying a request
///
/// Requests that differ only in case or whitespace hash identically.
#[must_use]
pub fn fingerprint(messages: &[Message], model: Option<&str>) -> String {
    let input = FingerprintInput {
        messages: messages
            .iter()
            .map(|m| FingerprintMessage {
                role: m.role.as_str(),
                content: normalize(&m.content),
            })
            .collect(),
        model: model.map(normalize).unwrap_or_default(),
    };

    // Serializing plain strings cannot fail
    let serialized = serde_json::to_string(&input).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Response cache over a key-value store
pub struct ResponseCache {
    store: SharedStore,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create a cache over `store`
    #[must_use]
    pub fn new(store: SharedStore, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Cache configuration
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn key(fingerprint: &str, category: CacheCategory) -> String {
        format!("cache:{}:{}", category, fingerprint)
    }

    /// Look up a payload; expired entries are removed and reported as a miss
    pub async fn get(&self, fingerprint: &str, category: CacheCategory) -> Option<Value> {
        let key = Self::key(fingerprint, category);

        let entry: CacheEntry = match get_json(self.store.as_ref(), &key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(category = %category, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(category = %category, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        if entry.is_expired(self.config.ttl(category), Utc::now()) {
            debug!(category = %category, stored_at = %entry.stored_at, "Cache entry expired");
            if let Err(e) = self.store.delete(&key).await {
                warn!(category = %category, error = %e, "Failed to evict expired cache entry");
            }
            return None;
        }

        debug!(category = %category, "Cache hit");
        Some(entry.payload)
    }

    /// Store a payload; failures are logged and ignored
    pub async fn set(&self, fingerprint: &str, value: Value, category: CacheCategory) {
        let entry = CacheEntry {
            payload: value,
            category,
            stored_at: Utc::now(),
        };
        let key = Self::key(fingerprint, category);
        let ttl = self.config.ttl(category);

        if let Err(e) = set_json(self.store.as_ref(), &key, &entry, Some(ttl)).await {
            warn!(category = %category, error = %e, "Cache write failed");
        }
    }

    /// Drop an entry; returns whether one was removed
    pub async fn invalidate(&self, fingerprint: &str, category: CacheCategory) -> bool {
        match self.store.delete(&Self::key(fingerprint, category)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(category = %category, error = %e, "Cache invalidation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::failing_store;
    use crate::store::{KvStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn cache() -> (Arc<MemoryStore>, ResponseCache) {
        let store = Arc::new(MemoryStore::new());
        let cache = ResponseCache::new(store.clone(), CacheConfig::default());
        (store, cache)
    }

    #[test]
    fn test_fingerprint_normalizes_case_and_whitespace() {
        let a = vec![Message::user("What is   the Capital of France?")];
        let b = vec![Message::user("  what is the capital\nof france?  ")];
        assert_eq!(fingerprint(&a, Some("gpt-4o")), fingerprint(&b, Some("GPT-4o")));
    }

    #[test]
    fn test_fingerprint_differs_on_content_role_and_model() {
        let base = fingerprint(&[Message::user("hello")], Some("m"));
        assert_ne!(base, fingerprint(&[Message::user("goodbye")], Some("m")));
        assert_ne!(base, fingerprint(&[Message::assistant("hello")], Some("m")));
        assert_ne!(base, fingerprint(&[Message::user("hello")], Some("other")));
        assert_ne!(base, fingerprint(&[Message::user("hello")], None));
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint(&[Message::user("hello")], None);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_default_ttls() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl(CacheCategory::ProviderResponse), Duration::from_secs(86_400));
        assert_eq!(config.ttl(CacheCategory::ResourceContent), Duration::from_secs(21_600));
        assert_eq!(config.ttl(CacheCategory::ReportSection), Duration::from_secs(7_200));
        assert_eq!(config.ttl(CacheCategory::Generic), Duration::from_secs(3_600));
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (store, cache) = cache();
        cache
            .set("abc", json!({"content": "hi"}), CacheCategory::ProviderResponse)
            .await;

        let hit = cache.get("abc", CacheCategory::ProviderResponse).await;
        assert_eq!(hit, Some(json!({"content": "hi"})));
        assert!(store
            .get("cache:provider_response:abc")
            .await
            .unwrap()
            .is_some());

        // categories are separate namespaces
        assert!(cache.get("abc", CacheCategory::Generic).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_removed() {
        let (store, cache) = cache();
        let stale = CacheEntry {
            payload: json!("old"),
            category: CacheCategory::ProviderResponse,
            stored_at: Utc::now() - chrono::Duration::hours(25),
        };
        set_json(store.as_ref(), "cache:provider_response:fp", &stale, None)
            .await
            .unwrap();

        assert!(cache.get("fp", CacheCategory::ProviderResponse).await.is_none());
        assert!(store
            .get("cache:provider_response:fp")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_entry_within_ttl_is_served() {
        let (store, cache) = cache();
        let fresh = CacheEntry {
            payload: json!("recent"),
            category: CacheCategory::ReportSection,
            stored_at: Utc::now() - chrono::Duration::minutes(90),
        };
        set_json(store.as_ref(), "cache:report_section:fp", &fresh, None)
            .await
            .unwrap();

        assert_eq!(
            cache.get("fp", CacheCategory::ReportSection).await,
            Some(json!("recent"))
        );
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (_store, cache) = cache();
        cache.set("fp", json!(1), CacheCategory::Generic).await;
        assert!(cache.invalidate("fp", CacheCategory::Generic).await);
        assert!(!cache.invalidate("fp", CacheCategory::Generic).await);
        assert!(cache.get("fp", CacheCategory::Generic).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss() {
        let (store, cache) = cache();
        store.set("cache:generic:fp", "{not json", None).await.unwrap();
        assert!(cache.get("fp", CacheCategory::Generic).await.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_silently() {
        let cache = ResponseCache::new(Arc::new(failing_store()), CacheConfig::default());

        cache.set("fp", json!("x"), CacheCategory::Generic).await;
        assert!(cache.get("fp", CacheCategory::Generic).await.is_none());
        assert!(!cache.invalidate("fp", CacheCategory::Generic).await);
    }
}
