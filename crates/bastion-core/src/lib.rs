//! Bastion Core - Orchestration Facade
//!
//! This crate provides the per-turn orchestration layer in front of the
//! upstream providers managed by `bastion-llm`, including:
//! - Orchestrator: one entry point per conversational turn
//! - Cache: fingerprinted response cache with per-category TTLs
//! - Checkpoint: per-thread conversation snapshots and recovery
//! - Metrics: hourly aggregation and threshold alerting
//! - Store: key-value persistence (Redis or in-memory)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod checkpoint;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod store;

pub use cache::{fingerprint, CacheCategory, CacheConfig, CacheEntry, ResponseCache};
pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointManager, CheckpointMetadata, CheckpointSnapshot,
    RecoveredState,
};
pub use error::{user_facing_text, Error, Result, StoreError, UserFriendlyError};
pub use metrics::{
    Alert, AlertKind, AlertSeverity, MetricsBucket, MetricsCollector, MetricsConfig,
    ProviderMetrics, SystemMetrics,
};
pub use orchestrator::{
    Orchestrator, OrchestratorBuilder, OrchestratorConfig, TurnReply, TurnRequest, TurnResponse,
    TurnStatus, TurnUsage,
};
pub use store::{KvStore, MemoryStore, RedisStore, SharedStore};
