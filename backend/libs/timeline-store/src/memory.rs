//! In-memory timelines for tests and local runs
//!
//! Same semantics as the Redis adapter (cap, dedup, newest first). Each
//! `prepend` holds the DashMap entry lock for its user, which gives the same
//! per-user atomicity as a MULTI/EXEC pipeline.
//!
//! Fault injection lets worker tests simulate an outage of the whole store or
//! of individual follower timelines.

use crate::{StoreError, TimelineConfig, TimelineStore};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryTimelineStore {
    config: TimelineConfig,
    timelines: DashMap<Uuid, VecDeque<Uuid>>,
    unavailable: AtomicBool,
    failing_users: DashSet<Uuid>,
    latency: Mutex<Option<Duration>>,
    writes: AtomicUsize,
}

impl MemoryTimelineStore {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_cap(cap: usize) -> Self {
        Self::new(TimelineConfig {
            cap,
            ..Default::default()
        })
    }

    /// Make every call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make writes to one user's timeline fail
    pub fn fail_writes_for(&self, user_id: Uuid) {
        self.failing_users.insert(user_id);
    }

    pub fn heal(&self, user_id: Uuid) {
        self.failing_users.remove(&user_id);
    }

    /// Delay every call; combined with the op timeout this simulates a hang
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Number of successful prepends since creation
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Full snapshot of a timeline, newest first
    pub fn snapshot(&self, user_id: Uuid) -> Vec<Uuid> {
        self.timelines
            .get(&user_id)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        let latency = self.latency.lock().ok().and_then(|guard| *guard);
        if let Some(latency) = latency {
            if latency >= self.config.op_timeout {
                tokio::time::sleep(self.config.op_timeout).await;
                return Err(StoreError::Timeout(self.config.op_timeout));
            }
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TimelineStore for MemoryTimelineStore {
    async fn prepend(&self, user_id: Uuid, post_id: Uuid) -> Result<(), StoreError> {
        self.check_available().await?;
        if self.failing_users.contains(&user_id) {
            return Err(StoreError::Unavailable(format!(
                "write to timeline {} rejected",
                user_id
            )));
        }

        let mut timeline = self.timelines.entry(user_id).or_default();
        if self.config.dedup {
            timeline.retain(|id| *id != post_id);
        }
        timeline.push_front(post_id);
        timeline.truncate(self.config.cap);
        drop(timeline);

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(
        &self,
        user_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.check_available().await?;

        Ok(self
            .timelines
            .get(&user_id)
            .map(|t| t.iter().skip(offset).take(limit).copied().collect())
            .unwrap_or_default())
    }

    async fn len(&self, user_id: Uuid) -> Result<usize, StoreError> {
        self.check_available().await?;
        Ok(self.timelines.get(&user_id).map(|t| t.len()).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available().await
    }
}
