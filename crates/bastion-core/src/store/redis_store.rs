use super::{KvStore, StoreResult};
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const SCAN_BATCH: usize = 200;

/// Redis-backed store (for production)
///
/// # Security Features
///
/// - Keys are namespaced to isolate them from other Redis data
/// - Consider enabling Redis AUTH and TLS in production
pub struct RedisStore {
    client: redis::Client,
    /// Namespace prepended to every key
    namespace: String,
    closed: AtomicBool,
}

impl RedisStore {
    /// Create a new Redis store with the default `bastion:` namespace
    ///
    /// # Errors
    ///
    /// Returns error if Redis URL is invalid
    pub fn new(redis_url: &str) -> StoreResult<Self> {
        Self::with_namespace(redis_url, "bastion:")
    }

    /// Create with a custom key namespace
    ///
    /// # Errors
    ///
    /// Returns error if Redis URL is invalid
    pub fn with_namespace(redis_url: &str, namespace: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("invalid redis url: {e}")))?;

        info!(namespace = %namespace, "Redis store configured");
        Ok(Self {
            client,
            namespace: namespace.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn strip_namespace<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.namespace.as_str()).unwrap_or(key)
    }

    /// Get an async connection
    async fn get_connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(format!("redis connection failed: {e}")))
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(self.build_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.get_connection().await?;
        let full_key = self.build_key(key);

        match ttl {
            Some(ttl) => {
                // SETEX rejects 0
                let seconds = ttl.as_secs().max(1);
                redis::cmd("SETEX")
                    .arg(&full_key)
                    .arg(seconds)
                    .arg(value)
                    .query_async::<()>(&mut conn)
                    .await?;
            }
            None => {
                redis::cmd("SET")
                    .arg(&full_key)
                    .arg(value)
                    .query_async::<()>(&mut conn)
                    .await?;
            }
        }

        debug!(key = %full_key, "Value stored in Redis");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.get_connection().await?;
        let deleted: i32 = redis::cmd("DEL")
            .arg(self.build_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let pattern = format!("{}*", self.build_key(prefix));

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            keys.extend(
                batch
                    .iter()
                    // MATCH treats glob characters in the prefix as wildcards
                    .filter(|k| k.starts_with(&self.build_key(prefix)))
                    .map(|k| self.strip_namespace(k).to_string()),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        info!("Redis store closed");
        Ok(())
    }
}

#[cfg(all(test, feature = "redis-tests"))]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    fn test_store() -> RedisStore {
        let namespace = format!("bastion-test:{}:", uuid::Uuid::new_v4());
        RedisStore::with_namespace(&redis_url(), &namespace).unwrap()
    }

    #[tokio::test]
    async fn test_redis_roundtrip() {
        let store = test_store();
        store.ping().await.unwrap();

        store.set("k", "v", Some(Duration::from_secs(60))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_prefix_scan() {
        let store = test_store();
        for i in 0..5 {
            store
                .set(&format!("cache:generic:{i}"), "x", Some(Duration::from_secs(60)))
                .await
                .unwrap();
        }
        store.set("other:1", "x", Some(Duration::from_secs(60))).await.unwrap();

        let keys = store.keys("cache:").await.unwrap();
        assert_eq!(keys.len(), 5);
        assert!(keys.iter().all(|k| k.starts_with("cache:generic:")));
    }

    #[tokio::test]
    async fn test_redis_closed() {
        let store = test_store();
        store.close().await.unwrap();
        assert!(matches!(store.get("k").await, Err(StoreError::Closed)));
    }
}
