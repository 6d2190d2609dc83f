//! mockall double for exercising store failure paths

use super::{KvStore, StoreResult};
use crate::error::StoreError;
use async_trait::async_trait;
use mockall::mock;
use std::time::Duration;

mock! {
    pub Store {}

    #[async_trait]
    impl KvStore for Store {
        async fn get(&self, key: &str) -> StoreResult<Option<String>>;
        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;
        async fn delete(&self, key: &str) -> StoreResult<bool>;
        async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
        async fn ping(&self) -> StoreResult<()>;
        async fn close(&self) -> StoreResult<()>;
    }
}

fn down() -> StoreError {
    StoreError::Connection("connection refused".to_string())
}

/// A store whose every operation fails
pub(crate) fn failing_store() -> MockStore {
    let mut store = MockStore::new();
    store.expect_get().returning(|_| Err(down()));
    store.expect_set().returning(|_, _, _| Err(down()));
    store.expect_delete().returning(|_| Err(down()));
    store.expect_keys().returning(|_| Err(down()));
    store.expect_ping().returning(|| Err(down()));
    store.expect_close().returning(|| Ok(()));
    store
}
