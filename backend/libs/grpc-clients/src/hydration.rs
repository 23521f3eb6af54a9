//! Post hydration
//!
//! Timelines store ids only; bodies and counters are fetched from the tweet
//! service for each page that is read.

use crate::proto::tweet::{GetTweetsReq, GetTweetsRes, TweetStruct, GET_TWEETS_PATH};
use crate::{unary, GrpcConfig, GrpcConfigError};
use async_trait::async_trait;
use dashmap::DashMap;
use resilience::{call_with_timeout, CallError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tonic::transport::Channel;
use tracing::{debug, warn};
use uuid::Uuid;

/// A post with its current body and counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HydratedPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub num_likes: i64,
    pub num_replies: i64,
    pub num_reposts: i64,
    /// Unix seconds
    pub created_at: i64,
}

impl TryFrom<TweetStruct> for HydratedPost {
    type Error = uuid::Error;

    fn try_from(tweet: TweetStruct) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&tweet.id)?,
            user_id: Uuid::parse_str(&tweet.user_id)?,
            content: tweet.content,
            num_likes: tweet.num_likes,
            num_replies: tweet.num_replys,
            num_reposts: tweet.num_reposts,
            created_at: tweet.created_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("post hydration unavailable: {0}")]
    Unavailable(String),

    #[error("post hydration timed out after {0:?}")]
    Timeout(Duration),
}

/// Fetch posts by id. Missing ids are simply absent from the result; the
/// result order is unspecified.
#[async_trait]
pub trait PostHydrator: Send + Sync {
    async fn get_posts(&self, post_ids: &[Uuid]) -> Result<Vec<HydratedPost>, HydrationError>;
}

/// `tweet.Tweet/GetTweets` over a lazily connected channel
#[derive(Clone)]
pub struct GrpcPostHydrator {
    channel: Channel,
    timeout: Duration,
}

impl GrpcPostHydrator {
    pub fn new(channel: Channel, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    pub fn from_config(config: &GrpcConfig) -> Result<Self, GrpcConfigError> {
        let channel = config.lazy_channel(&config.tweet_service_url)?;
        Ok(Self::new(channel, config.hydration_timeout))
    }
}

#[async_trait]
impl PostHydrator for GrpcPostHydrator {
    async fn get_posts(&self, post_ids: &[Uuid]) -> Result<Vec<HydratedPost>, HydrationError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let request = GetTweetsReq {
            tweet_ids: post_ids.iter().map(Uuid::to_string).collect(),
        };

        let response: GetTweetsRes = call_with_timeout(
            self.timeout,
            unary(self.channel.clone(), GET_TWEETS_PATH, request),
        )
        .await
        .map_err(|err| match err {
            CallError::Timeout(elapsed) => HydrationError::Timeout(elapsed),
            CallError::Failed(status) => HydrationError::Unavailable(format!(
                "{:?}: {}",
                status.code(),
                status.message()
            )),
        })?;

        let mut posts = Vec::with_capacity(response.tweets.len());
        for tweet in response.tweets {
            let raw_id = tweet.id.clone();
            match HydratedPost::try_from(tweet) {
                Ok(post) => posts.push(post),
                Err(e) => warn!(post_id = %raw_id, error = %e, "Dropping post with invalid id"),
            }
        }

        debug!(
            requested = post_ids.len(),
            returned = posts.len(),
            "Hydrated posts"
        );
        Ok(posts)
    }
}

/// In-memory post catalogue
#[derive(Default)]
pub struct MemoryPostHydrator {
    posts: DashMap<Uuid, HydratedPost>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryPostHydrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, post: HydratedPost) {
        self.posts.insert(post.id, post);
    }

    pub fn remove(&self, post_id: Uuid) {
        self.posts.remove(&post_id);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups that reached the catalogue
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostHydrator for MemoryPostHydrator {
    async fn get_posts(&self, post_ids: &[Uuid]) -> Result<Vec<HydratedPost>, HydrationError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(HydrationError::Unavailable("connection refused".to_string()));
        }

        Ok(post_ids
            .iter()
            .filter_map(|id| self.posts.get(id).map(|p| p.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(id: &str) -> TweetStruct {
        TweetStruct {
            id: id.to_string(),
            user_id: "123e4567-e89b-12d3-a456-426614174000".to_string(),
            content: "hello".to_string(),
            num_likes: 3,
            num_replys: 1,
            num_reposts: 0,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_tweet_struct_conversion() {
        let post =
            HydratedPost::try_from(tweet("987fcdeb-51a2-4bc4-9567-890123456789")).unwrap();
        assert_eq!(post.num_replies, 1);
        assert_eq!(post.created_at, 1_700_000_000);

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["num_replies"], 1);
        assert_eq!(json["id"], "987fcdeb-51a2-4bc4-9567-890123456789");

        assert!(HydratedPost::try_from(tweet("not-a-uuid")).is_err());
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        // Unreachable endpoint: any network call would fail
        let config = GrpcConfig {
            tweet_service_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let hydrator = GrpcPostHydrator::from_config(&config).unwrap();
        assert!(hydrator.get_posts(&[]).await.unwrap().is_empty());

        let memory = MemoryPostHydrator::new();
        memory.set_unavailable(true);
        assert!(memory.get_posts(&[]).await.unwrap().is_empty());
        assert_eq!(memory.calls(), 0);
    }

    #[tokio::test]
    async fn test_memory_hydrator_partial_miss() {
        let hydrator = MemoryPostHydrator::new();
        let known = HydratedPost::try_from(tweet("987fcdeb-51a2-4bc4-9567-890123456789")).unwrap();
        hydrator.insert(known.clone());

        let posts = hydrator
            .get_posts(&[Uuid::new_v4(), known.id])
            .await
            .unwrap();
        assert_eq!(posts, vec![known]);
    }
}
