//! Conversation checkpoints and recovery
//!
//! A checkpoint is written before every upstream call so a failed turn can
//! resume from the last known-good state. Per thread the store holds:
//!
//! - `checkpoint:{thread}:{id}`: the checkpoint itself
//! - `checkpoint:{thread}:index`: ids with sequence numbers, oldest first
//! - `checkpoint:{thread}:latest`: id of the most recent checkpoint
//!
//! Writes for one thread are serialized, so sequence numbers strictly
//! increase and eviction never races with a concurrent save.

use crate::error::{Error, Result};
use crate::store::{get_json, set_json, SharedStore};
use bastion_llm::message::trailing_window;
use bastion_llm::token::estimate_message_tokens;
use bastion_llm::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Checkpoint retention settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Checkpoints kept per thread
    pub max_checkpoints: usize,
    /// Trailing messages stored with each checkpoint
    pub message_window: usize,
    /// Store TTL for checkpoint keys
    pub ttl_secs: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            max_checkpoints: 5,
            message_window: 20,
            ttl_secs: 7 * 24 * 3600,
        }
    }
}

impl CheckpointConfig {
    /// Reject settings that would make checkpoints useless
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero limit or window
    pub fn validate(&self) -> Result<()> {
        if self.max_checkpoints == 0 {
            return Err(Error::InvalidConfig {
                field: "checkpoint.max_checkpoints".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.message_window == 0 {
            return Err(Error::InvalidConfig {
                field: "checkpoint.message_window".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// What the caller wants preserved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    /// Opaque workflow state
    pub state: Value,
    /// Full conversation; only the trailing window is kept
    pub messages: Vec<Message>,
    /// Model about to be used, if known
    pub model: Option<String>,
}

impl CheckpointSnapshot {
    /// Snapshot of a conversation and workflow state
    #[must_use]
    pub fn new(state: Value, messages: Vec<Message>) -> Self {
        Self {
            state,
            messages,
            model: None,
        }
    }

    /// Record the model about to be used
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Checkpoint metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model used
    pub model: Option<String>,
    /// Estimated tokens of the stored messages
    pub token_estimate: usize,
}

/// Stored checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint id
    pub id: String,
    /// Thread the checkpoint belongs to
    pub thread_id: String,
    /// Strictly increasing per thread
    pub sequence: u64,
    /// Opaque workflow state
    pub state: Value,
    /// Trailing message window
    pub messages: Vec<Message>,
    /// Metadata
    pub metadata: CheckpointMetadata,
    /// When the checkpoint was written
    pub created_at: DateTime<Utc>,
}

/// State handed back to the workflow after a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredState {
    /// Checkpoint recovered from
    pub checkpoint_id: String,
    /// Its sequence number
    pub sequence: u64,
    /// Workflow state at that checkpoint
    pub state: Value,
    /// Checkpoint messages followed by a system note describing the failure
    pub messages: Vec<Message>,
    /// When the checkpoint was written
    pub checkpointed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IndexEntry {
    id: String,
    sequence: u64,
}

/// Per-thread checkpoint manager
pub struct CheckpointManager {
    store: SharedStore,
    config: CheckpointConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CheckpointManager {
    /// Create a manager over `store`
    #[must_use]
    pub fn new(store: SharedStore, config: CheckpointConfig) -> Self {
        Self {
            store,
            config,
            locks: DashMap::new(),
        }
    }

    /// Checkpoint configuration
    #[must_use]
    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    fn checkpoint_key(thread_id: &str, id: &str) -> String {
        format!("checkpoint:{}:{}", thread_id, id)
    }

    fn index_key(thread_id: &str) -> String {
        format!("checkpoint:{}:index", thread_id)
    }

    fn latest_key(thread_id: &str) -> String {
        format!("checkpoint:{}:latest", thread_id)
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(thread_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop the thread's lock entry once nobody else holds or awaits it
    fn release_lock(&self, thread_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn load_index(&self, thread_id: &str) -> Result<Vec<IndexEntry>> {
        let index: Option<Vec<IndexEntry>> =
            get_json(self.store.as_ref(), &Self::index_key(thread_id)).await?;
        Ok(index.unwrap_or_default())
    }

    async fn load(&self, thread_id: &str, id: &str) -> Result<Option<Checkpoint>> {
        Ok(get_json(self.store.as_ref(), &Self::checkpoint_key(thread_id, id)).await?)
    }

    /// Write a checkpoint, evicting the oldest beyond the retention limit
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects a write
    #[instrument(skip(self, snapshot))]
    pub async fn save(&self, thread_id: &str, snapshot: CheckpointSnapshot) -> Result<Checkpoint> {
        let lock = self.thread_lock(thread_id);
        let result = {
            let _guard = lock.lock().await;
            self.save_locked(thread_id, snapshot).await
        };
        self.release_lock(thread_id, lock);
        result
    }

    async fn save_locked(
        &self,
        thread_id: &str,
        snapshot: CheckpointSnapshot,
    ) -> Result<Checkpoint> {
        let mut index = self.load_index(thread_id).await?;
        let sequence = index.last().map_or(1, |e| e.sequence + 1);

        let messages = trailing_window(&snapshot.messages, self.config.message_window);
        let checkpoint = Checkpoint {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            sequence,
            state: snapshot.state,
            metadata: CheckpointMetadata {
                model: snapshot.model,
                token_estimate: estimate_message_tokens(&messages),
            },
            messages,
            created_at: Utc::now(),
        };

        let ttl = Some(self.config.ttl());
        set_json(
            self.store.as_ref(),
            &Self::checkpoint_key(thread_id, &checkpoint.id),
            &checkpoint,
            ttl,
        )
        .await?;

        index.push(IndexEntry {
            id: checkpoint.id.clone(),
            sequence,
        });
        let overflow = index.len().saturating_sub(self.config.max_checkpoints.max(1));
        let evicted: Vec<IndexEntry> = index.drain(..overflow).collect();

        set_json(self.store.as_ref(), &Self::index_key(thread_id), &index, ttl).await?;
        self.store
            .set(&Self::latest_key(thread_id), &checkpoint.id, ttl)
            .await?;

        for entry in &evicted {
            if let Err(e) = self
                .store
                .delete(&Self::checkpoint_key(thread_id, &entry.id))
                .await
            {
                // Orphans still expire with their TTL
                warn!(checkpoint_id = %entry.id, error = %e, "Failed to evict checkpoint");
            }
        }

        debug!(
            checkpoint_id = %checkpoint.id,
            sequence,
            evicted = evicted.len(),
            "Checkpoint saved"
        );
        Ok(checkpoint)
    }

    /// Best-effort save: store failures are logged and swallowed
    pub async fn checkpoint(
        &self,
        thread_id: &str,
        snapshot: CheckpointSnapshot,
    ) -> Option<Checkpoint> {
        match self.save(thread_id, snapshot).await {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Checkpoint failed, continuing without");
                None
            }
        }
    }

    /// Checkpoints of a thread, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let index = self.load_index(thread_id).await?;
        let mut checkpoints = Vec::with_capacity(index.len());
        for entry in index {
            if let Some(checkpoint) = self.load(thread_id, &entry.id).await? {
                checkpoints.push(checkpoint);
            }
        }
        checkpoints.sort_by_key(|c| c.sequence);
        Ok(checkpoints)
    }

    /// Most recent checkpoint of a thread
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        if let Some(id) = self.store.get(&Self::latest_key(thread_id)).await? {
            if let Some(checkpoint) = self.load(thread_id, &id).await? {
                return Ok(Some(checkpoint));
            }
        }

        // Pointer missing or stale: fall back to the index
        Ok(self.list(thread_id).await?.pop())
    }

    /// Restore the most recent checkpoint with a note describing the failure
    ///
    /// The failed step is never replayed; the caller decides what to do next.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    #[instrument(skip(self, failure))]
    pub async fn recover(&self, thread_id: &str, failure: &str) -> Result<Option<RecoveredState>> {
        let Some(checkpoint) = self.latest(thread_id).await? else {
            debug!("No checkpoint to recover from");
            return Ok(None);
        };

        let mut messages = checkpoint.messages;
        messages.push(Message::system(format!(
            "Recovered from checkpoint {} after a failure: {}. The failed step was not retried.",
            checkpoint.sequence, failure
        )));

        info!(
            checkpoint_id = %checkpoint.id,
            sequence = checkpoint.sequence,
            "Recovered from checkpoint"
        );

        Ok(Some(RecoveredState {
            checkpoint_id: checkpoint.id,
            sequence: checkpoint.sequence,
            state: checkpoint.state,
            messages,
            checkpointed_at: checkpoint.created_at,
        }))
    }

    /// Delete every checkpoint of a thread; returns how many were removed
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects a delete
    pub async fn clear(&self, thread_id: &str) -> Result<usize> {
        let lock = self.thread_lock(thread_id);
        let result = {
            let _guard = lock.lock().await;
            self.clear_locked(thread_id).await
        };
        self.release_lock(thread_id, lock);
        result
    }

    async fn clear_locked(&self, thread_id: &str) -> Result<usize> {
        let index = self.load_index(thread_id).await?;
        let mut removed = 0;
        for entry in &index {
            if self
                .store
                .delete(&Self::checkpoint_key(thread_id, &entry.id))
                .await?
            {
                removed += 1;
            }
        }
        self.store.delete(&Self::index_key(thread_id)).await?;
        self.store.delete(&Self::latest_key(thread_id)).await?;

        info!(thread_id = %thread_id, removed, "Checkpoints cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::failing_store;
    use crate::store::{KvStore, MemoryStore};
    use serde_json::json;

    fn manager() -> (Arc<MemoryStore>, CheckpointManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = CheckpointManager::new(store.clone(), CheckpointConfig::default());
        (store, manager)
    }

    fn snapshot(step: u32) -> CheckpointSnapshot {
        CheckpointSnapshot::new(
            json!({"step": step}),
            vec![Message::user(format!("message {step}"))],
        )
    }

    #[tokio::test]
    async fn test_save_and_latest() {
        let (_store, manager) = manager();
        let saved = manager
            .save("t1", snapshot(1).with_model("gpt-4o-mini"))
            .await
            .unwrap();

        assert_eq!(saved.sequence, 1);
        assert_eq!(saved.metadata.model.as_deref(), Some("gpt-4o-mini"));
        assert!(saved.metadata.token_estimate > 0);

        let latest = manager.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest, saved);
        assert!(manager.latest("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sequence_strictly_increases() {
        let (_store, manager) = manager();
        let mut last = 0;
        for step in 0..4 {
            let saved = manager.save("t1", snapshot(step)).await.unwrap();
            assert!(saved.sequence > last);
            last = saved.sequence;
        }
    }

    #[tokio::test]
    async fn test_eviction_keeps_most_recent() {
        let (store, manager) = manager();
        let mut ids = Vec::new();
        for step in 0..8 {
            ids.push(manager.save("t1", snapshot(step)).await.unwrap().id);
        }

        let remaining = manager.list("t1").await.unwrap();
        assert_eq!(remaining.len(), 5);
        let sequences: Vec<u64> = remaining.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![4, 5, 6, 7, 8]);

        // evicted checkpoints are gone from the store too
        for id in &ids[..3] {
            let key = format!("checkpoint:t1:{id}");
            assert!(store.get(&key).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_message_window_is_trailing() {
        let (_store, manager) = manager();
        let messages: Vec<Message> = (0..30).map(|i| Message::user(format!("m{i}"))).collect();
        let saved = manager
            .save("t1", CheckpointSnapshot::new(json!({}), messages))
            .await
            .unwrap();

        assert_eq!(saved.messages.len(), 20);
        assert_eq!(saved.messages[0].content, "m10");
        assert_eq!(saved.messages[19].content, "m29");
    }

    #[tokio::test]
    async fn test_concurrent_saves_serialize_per_thread() {
        let (_store, manager) = manager();
        let manager = Arc::new(manager);

        let mut handles = Vec::new();
        for step in 0..10 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.save("busy", snapshot(step)).await.unwrap().sequence
            }));
        }

        let mut sequences = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap());
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=10).collect::<Vec<u64>>());
        assert_eq!(manager.list("busy").await.unwrap().len(), 5);
        assert!(manager.locks.is_empty());
    }

    #[tokio::test]
    async fn test_thread_locks_released() {
        let (_store, manager) = manager();
        for i in 0..1_000 {
            let thread = format!("thread-{i}");
            assert!(manager.checkpoint(&thread, snapshot(i)).await.is_some());
            manager.clear(&thread).await.unwrap();
        }
        assert!(manager.locks.is_empty());

        manager.save("kept", snapshot(1)).await.unwrap();
        assert!(manager.locks.is_empty());
        assert_eq!(manager.list("kept").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_releases_lock() {
        let manager = CheckpointManager::new(Arc::new(failing_store()), CheckpointConfig::default());
        assert!(manager.save("t1", snapshot(1)).await.is_err());
        assert!(manager.clear("t1").await.is_err());
        assert!(manager.locks.is_empty());
    }

    #[tokio::test]
    async fn test_recover_appends_note() {
        let (_store, manager) = manager();
        manager.save("t1", snapshot(1)).await.unwrap();
        manager.save("t1", snapshot(2)).await.unwrap();

        let recovered = manager
            .recover("t1", "upstream providers unavailable")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(recovered.sequence, 2);
        assert_eq!(recovered.state, json!({"step": 2}));
        assert_eq!(recovered.messages.len(), 2);
        assert_eq!(recovered.messages[0].content, "message 2");
        let note = &recovered.messages[1];
        assert_eq!(note.role, bastion_llm::MessageRole::System);
        assert!(note.content.contains("upstream providers unavailable"));
    }

    #[tokio::test]
    async fn test_recover_without_checkpoint() {
        let (_store, manager) = manager();
        assert!(manager.recover("empty", "boom").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_falls_back_to_index() {
        let (store, manager) = manager();
        manager.save("t1", snapshot(1)).await.unwrap();
        let second = manager.save("t1", snapshot(2)).await.unwrap();
        store.delete("checkpoint:t1:latest").await.unwrap();

        assert_eq!(manager.latest("t1").await.unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, manager) = manager();
        for step in 0..3 {
            manager.save("t1", snapshot(step)).await.unwrap();
        }
        manager.save("t2", snapshot(0)).await.unwrap();

        assert_eq!(manager.clear("t1").await.unwrap(), 3);
        assert!(manager.latest("t1").await.unwrap().is_none());
        assert!(store.keys("checkpoint:t1:").await.unwrap().is_empty());
        assert_eq!(manager.list("t2").await.unwrap().len(), 1);

        // sequence restarts after a clear
        assert_eq!(manager.save("t1", snapshot(9)).await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_swallows_store_errors() {
        let manager = CheckpointManager::new(Arc::new(failing_store()), CheckpointConfig::default());
        assert!(manager.checkpoint("t1", snapshot(1)).await.is_none());
        assert!(manager.save("t1", snapshot(1)).await.is_err());
        assert!(manager.recover("t1", "boom").await.is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(CheckpointConfig::default().validate().is_ok());
        let config = CheckpointConfig {
            max_checkpoints: 0,
            ..CheckpointConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }
}
