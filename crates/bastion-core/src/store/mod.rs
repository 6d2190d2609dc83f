//! Key-value store backends
//!
//! Every store-backed component (cache, checkpoints, metrics) talks to a
//! [`KvStore`] handed to it at construction time.
//!
//! # Backends
//!
//! - [`MemoryStore`]: in-process map with expiry, for development and tests.
//!   Data is lost on restart.
//! - [`RedisStore`]: Redis over a multiplexed async connection. Use this in
//!   production.
//!
//! Key families in use: `cache:`, `checkpoint:`, `metrics:` and `alert:`.

mod memory;
mod redis_store;

#[cfg(test)]
pub(crate) mod mock;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Async key-value store
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete a key; returns whether it existed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// All live keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Liveness check
    async fn ping(&self) -> StoreResult<()>;

    /// Release the backend; later calls fail with [`StoreError::Closed`]
    async fn close(&self) -> StoreResult<()>;
}

/// Shared store handle
pub type SharedStore = Arc<dyn KvStore>;

/// Read and deserialize a JSON value
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON value
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw, ttl).await
}
