/// Event schema for the tweet event topic
///
/// Post services publish one message per tweet action. The feed pipeline only
/// depends on the creation event, which carries identifiers and nothing else:
/// post bodies are hydrated on read, never copied into the event.
///
/// Wire format (JSON payload, routing key in the `event_type` header,
/// message key = author id):
///
/// ```text
/// event_type: tweet.create
/// key:        <author uuid>
/// payload:    {"user_id": "<author uuid>", "tweet_id": "<post uuid>"}
/// ```
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod routing;

pub use routing::{RoutingKey, TopicPattern, EVENT_TYPE_HEADER};

/// Default topic carrying tweet lifecycle events
pub const TWEET_EVENTS_TOPIC: &str = "tweet.events";

// ============================================================================
// POST EVENTS
// ============================================================================

/// A post was created by `author_id`.
///
/// Immutable once published. Consumers must tolerate receiving the same event
/// more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostCreatedEvent {
    #[serde(rename = "user_id")]
    pub author_id: Uuid,
    #[serde(rename = "tweet_id")]
    pub post_id: Uuid,
}

impl PostCreatedEvent {
    pub fn new(author_id: Uuid, post_id: Uuid) -> Self {
        Self { author_id, post_id }
    }

    /// Decode a raw message payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }
        serde_json::from_slice(payload).map_err(DecodeError::from)
    }

    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        serde_json::to_vec(self).map_err(DecodeError::from)
    }
}

/// Payload could not be turned into an event. Never retriable.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message has an empty payload")]
    EmptyPayload,

    #[error("invalid event payload: {0}")]
    Json(#[from] serde_json::Error),
}
