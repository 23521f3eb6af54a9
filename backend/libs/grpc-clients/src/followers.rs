//! Follower resolution
//!
//! The worker asks the user service who follows an author. The answer is a
//! point-in-time snapshot; it may be stale and may contain duplicates.

use crate::proto::user::{GetFollowersReq, GetFollowersRes, GET_FOLLOWERS_PATH};
use crate::{unary, GrpcConfig, GrpcConfigError};
use async_trait::async_trait;
use dashmap::DashMap;
use resilience::{call_with_timeout, CallError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tonic::transport::Channel;
use tonic::Code;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The author does not exist; the event can never succeed
    #[error("author {0} not found")]
    NotFound(Uuid),

    #[error("follower resolver unavailable: {0}")]
    Unavailable(String),

    #[error("follower resolver timed out after {0:?}")]
    Timeout(Duration),
}

impl ResolveError {
    /// Whether a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, ResolveError::NotFound(_))
    }
}

#[async_trait]
pub trait FollowerResolver: Send + Sync {
    async fn get_followers(&self, author_id: Uuid) -> Result<Vec<Uuid>, ResolveError>;
}

/// Map a gRPC status from the user service
pub fn status_to_resolve_error(author_id: Uuid, status: &tonic::Status) -> ResolveError {
    match status.code() {
        Code::NotFound => ResolveError::NotFound(author_id),
        code => ResolveError::Unavailable(format!("{:?}: {}", code, status.message())),
    }
}

/// `user.User/GetFollowers` over a lazily connected channel
#[derive(Clone)]
pub struct GrpcFollowerResolver {
    channel: Channel,
    timeout: Duration,
}

impl GrpcFollowerResolver {
    pub fn new(channel: Channel, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    pub fn from_config(config: &GrpcConfig) -> Result<Self, GrpcConfigError> {
        let channel = config.lazy_channel(&config.user_service_url)?;
        Ok(Self::new(channel, config.follower_timeout))
    }
}

#[async_trait]
impl FollowerResolver for GrpcFollowerResolver {
    async fn get_followers(&self, author_id: Uuid) -> Result<Vec<Uuid>, ResolveError> {
        let request = GetFollowersReq {
            user_id: author_id.to_string(),
        };

        let response: GetFollowersRes = call_with_timeout(
            self.timeout,
            unary(self.channel.clone(), GET_FOLLOWERS_PATH, request),
        )
        .await
        .map_err(|err| match err {
            CallError::Timeout(elapsed) => ResolveError::Timeout(elapsed),
            CallError::Failed(status) => status_to_resolve_error(author_id, &status),
        })?;

        let mut followers = Vec::with_capacity(response.followers.len());
        for follow in response.followers {
            match Uuid::parse_str(&follow.follower_id) {
                Ok(id) => followers.push(id),
                Err(e) => warn!(
                    author_id = %author_id,
                    follower_id = %follow.follower_id,
                    error = %e,
                    "Skipping follower with invalid id"
                ),
            }
        }

        debug!(author_id = %author_id, count = followers.len(), "Resolved followers");
        Ok(followers)
    }
}

/// In-memory follower graph
///
/// Authors that were never registered resolve to `NotFound`.
#[derive(Default)]
pub struct MemoryFollowerResolver {
    followers: DashMap<Uuid, Vec<Uuid>>,
    unavailable: AtomicBool,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryFollowerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an author with the given followers (may be empty)
    pub fn set_followers(&self, author_id: Uuid, followers: Vec<Uuid>) {
        self.followers.insert(author_id, followers);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` lookups, then recover
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FollowerResolver for MemoryFollowerResolver {
    async fn get_followers(&self, author_id: Uuid) -> Result<Vec<Uuid>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ResolveError::Unavailable("connection refused".to_string()));
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ResolveError::Unavailable("connection reset".to_string()));
        }

        self.followers
            .get(&author_id)
            .map(|f| f.value().clone())
            .ok_or(ResolveError::NotFound(author_id))
    }
}
