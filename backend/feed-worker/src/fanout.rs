//! Fan-out on write
//!
//! One `PostCreatedEvent` becomes one timeline prepend per distinct follower.
//! Writes are independent and run with bounded concurrency; the processor
//! waits for all of them before reporting, so the caller can decide between
//! ack and redelivery with the full picture.

use crate::error::FanoutError;
use crate::metrics;
use event_schema::PostCreatedEvent;
use futures::stream::{self, StreamExt};
use grpc_clients::FollowerResolver;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use timeline_store::TimelineStore;
use tracing::{debug, warn};
use uuid::Uuid;

/// Summary of one successfully applied event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub author_id: Uuid,
    pub post_id: Uuid,
    /// Distinct followers resolved
    pub followers: usize,
    pub written: usize,
    pub elapsed: Duration,
}

pub struct FanoutProcessor {
    resolver: Arc<dyn FollowerResolver>,
    store: Arc<dyn TimelineStore>,
    concurrency: usize,
}

impl FanoutProcessor {
    pub fn new(
        resolver: Arc<dyn FollowerResolver>,
        store: Arc<dyn TimelineStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Decode a raw payload and fan it out
    pub async fn process(&self, payload: &[u8]) -> Result<FanoutReport, FanoutError> {
        let event = PostCreatedEvent::decode(payload)?;
        self.fan_out(event).await
    }

    pub async fn fan_out(&self, event: PostCreatedEvent) -> Result<FanoutReport, FanoutError> {
        let started = Instant::now();

        let followers = distinct(self.resolver.get_followers(event.author_id).await?);
        let attempted = followers.len();

        if attempted == 0 {
            debug!(author_id = %event.author_id, post_id = %event.post_id, "Author has no followers");
            return Ok(FanoutReport {
                author_id: event.author_id,
                post_id: event.post_id,
                followers: 0,
                written: 0,
                elapsed: started.elapsed(),
            });
        }

        let post_id = event.post_id;
        let failures: Vec<Uuid> = stream::iter(followers)
            .map(|follower_id| {
                let store = Arc::clone(&self.store);
                async move {
                    match store.prepend(follower_id, post_id).await {
                        Ok(()) => None,
                        Err(e) => {
                            warn!(
                                follower_id = %follower_id,
                                post_id = %post_id,
                                error = %e,
                                "Timeline write failed"
                            );
                            Some(follower_id)
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|failed| async move { failed })
            .collect()
            .await;

        let failed = failures.len();
        let written = attempted - failed;
        let elapsed = started.elapsed();

        metrics::record_timeline_writes("success", written);
        metrics::record_timeline_writes("error", failed);
        metrics::record_fanout(attempted, elapsed);

        if failed > 0 {
            return Err(FanoutError::PartialFanoutFailure {
                post_id,
                failed,
                attempted,
            });
        }

        Ok(FanoutReport {
            author_id: event.author_id,
            post_id,
            followers: attempted,
            written,
            elapsed,
        })
    }
}

/// Drop repeated follower ids, keeping first-seen order
fn distinct(followers: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(followers.len());
    followers.into_iter().filter(|id| seen.insert(*id)).collect()
}
