//! Timeline read path
//!
//! Read a page of post ids from the timeline store, hydrate them, and return
//! them in timeline order. Hydration is best effort: a post that cannot be
//! hydrated is left out of the page. Only a store failure fails the read.

use grpc_clients::{HydratedPost, PostHydrator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use timeline_store::TimelineStore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::metrics;
use crate::models::FeedResponse;

pub struct TimelineReader {
    store: Arc<dyn TimelineStore>,
    hydrator: Arc<dyn PostHydrator>,
}

impl TimelineReader {
    pub fn new(store: Arc<dyn TimelineStore>, hydrator: Arc<dyn PostHydrator>) -> Self {
        Self { store, hydrator }
    }

    pub fn store(&self) -> &Arc<dyn TimelineStore> {
        &self.store
    }

    pub async fn read_page(
        &self,
        user_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<FeedResponse> {
        let started = Instant::now();

        let post_ids = self.store.read(user_id, limit, offset).await.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Timeline read failed");
            e
        })?;

        if post_ids.is_empty() {
            debug!(user_id = %user_id, offset, "Timeline page is empty");
            metrics::record_read_duration(started.elapsed());
            return Ok(FeedResponse::empty());
        }

        let tweets = self.hydrate_in_order(&post_ids).await;
        metrics::record_read_duration(started.elapsed());

        debug!(
            user_id = %user_id,
            ids = post_ids.len(),
            hydrated = tweets.len(),
            "Served timeline page"
        );
        Ok(FeedResponse::page(tweets, limit, offset))
    }

    /// Hydrate `post_ids` and return the hits in the same order. A post listed
    /// twice (timelines written without dedup) is returned twice.
    async fn hydrate_in_order(&self, post_ids: &[Uuid]) -> Vec<HydratedPost> {
        let posts = match self.hydrator.get_posts(post_ids).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(error = %e, ids = post_ids.len(), "Post hydration failed; serving empty page");
                metrics::record_hydration_degraded("failure", post_ids.len());
                return Vec::new();
            }
        };

        let by_id: HashMap<Uuid, HydratedPost> =
            posts.into_iter().map(|post| (post.id, post)).collect();
        let ordered: Vec<HydratedPost> = post_ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect();

        let missing = post_ids.len() - ordered.len();
        if missing > 0 {
            debug!(missing, "Some timeline posts could not be hydrated");
            metrics::record_hydration_degraded("miss", missing);
        }
        ordered
    }
}
