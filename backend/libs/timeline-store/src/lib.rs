//! Per-user home timelines as capped lists of post ids
//!
//! A timeline is keyed by the reading user and holds post ids newest first.
//! Writers prepend and trim in one atomic step, so a timeline never grows
//! past its cap even under concurrent fan-out from several workers.
//!
//! Key layout (Redis):
//! - `feed:{user_id}` → LIST of post uuids, head = newest

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod redis_store;

pub use memory::MemoryTimelineStore;
pub use redis_store::RedisTimelineStore;

/// Timeline store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timeline store unavailable: {0}")]
    Unavailable(String),

    #[error("timeline store call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Timeline configuration
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Maximum entries kept per user; older ones fall off the tail. Zero keeps none.
    pub cap: usize,
    /// Key prefix, keys are `{prefix}:{user_id}`
    pub key_prefix: String,
    /// Remove an existing copy of the post before prepending it
    pub dedup: bool,
    /// Deadline for a single store operation
    pub op_timeout: Duration,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            cap: 1000,
            key_prefix: "feed".to_string(),
            dedup: true,
            op_timeout: resilience::presets::timeline_store().duration,
        }
    }
}

impl TimelineConfig {
    pub fn key(&self, user_id: Uuid) -> String {
        format!("{}:{}", self.key_prefix, user_id)
    }
}

/// Storage for home timelines.
///
/// `prepend` must be atomic per user. Reads of unknown users are empty, not
/// errors.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Insert `post_id` at the head of `user_id`'s timeline, then trim to cap
    async fn prepend(&self, user_id: Uuid, post_id: Uuid) -> Result<(), StoreError>;

    /// Up to `limit` post ids starting at `offset`, newest first
    async fn read(&self, user_id: Uuid, limit: usize, offset: usize)
        -> Result<Vec<Uuid>, StoreError>;

    /// Current number of entries
    async fn len(&self, user_id: Uuid) -> Result<usize, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
