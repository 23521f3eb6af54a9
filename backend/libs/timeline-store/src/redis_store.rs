use crate::{StoreError, TimelineConfig, TimelineStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use resilience::{call_with_timeout, CallError};
use std::future::Future;
use tracing::{debug, warn};
use uuid::Uuid;

/// Redis-backed timelines (capped LIST per user)
#[derive(Clone)]
pub struct RedisTimelineStore {
    manager: ConnectionManager,
    config: TimelineConfig,
}

impl RedisTimelineStore {
    pub fn new(manager: ConnectionManager, config: TimelineConfig) -> Self {
        Self { manager, config }
    }

    /// Open a connection manager for `redis_url`
    pub async fn connect(redis_url: &str, config: TimelineConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager, config))
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        call_with_timeout(self.config.op_timeout, fut)
            .await
            .map_err(|err| {
                warn!(op, error = %err, "Redis timeline operation failed");
                match err {
                    CallError::Timeout(elapsed) => StoreError::Timeout(elapsed),
                    CallError::Failed(e) => StoreError::from(e),
                }
            })
    }
}

#[async_trait]
impl TimelineStore for RedisTimelineStore {
    async fn prepend(&self, user_id: Uuid, post_id: Uuid) -> Result<(), StoreError> {
        // LTRIM 0 -1 would keep everything; a zero cap keeps nothing
        if self.config.cap == 0 {
            debug!(user_id = %user_id, post_id = %post_id, "Timeline cap is zero; skipping prepend");
            return Ok(());
        }

        let key = self.config.key(user_id);
        let value = post_id.to_string();
        let max_index = (self.config.cap - 1) as isize;

        let mut pipe = redis::pipe();
        pipe.atomic();
        if self.config.dedup {
            pipe.lrem(&key, 0, &value).ignore();
        }
        pipe.lpush(&key, &value)
            .ignore()
            .ltrim(&key, 0, max_index)
            .ignore();

        let mut conn = self.manager.clone();
        self.bounded("prepend", pipe.query_async::<_, ()>(&mut conn))
            .await?;

        debug!(user_id = %user_id, post_id = %post_id, "Prepended post to timeline");
        Ok(())
    }

    async fn read(
        &self,
        user_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Uuid>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let key = self.config.key(user_id);
        let start = offset as isize;
        let stop = (offset + limit - 1) as isize;

        let mut conn = self.manager.clone();
        let raw: Vec<String> = self
            .bounded("read", conn.lrange(&key, start, stop))
            .await?;

        let mut ids = Vec::with_capacity(raw.len());
        for entry in raw {
            match Uuid::parse_str(&entry) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(key = %key, entry = %entry, error = %e, "Skipping unparsable timeline entry");
                }
            }
        }

        Ok(ids)
    }

    async fn len(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let key = self.config.key(user_id);
        let mut conn = self.manager.clone();
        self.bounded("len", conn.llen(&key)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        self.bounded(
            "ping",
            redis::cmd("PING").query_async::<_, String>(&mut conn),
        )
        .await?;
        Ok(())
    }
}
