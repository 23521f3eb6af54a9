use event_schema::DecodeError;
use grpc_clients::ResolveError;
use thiserror::Error;
use uuid::Uuid;

/// Why a message could not be fanned out
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("undecodable event: {0}")]
    Decode(#[from] DecodeError),

    #[error("author {0} not found")]
    AuthorNotFound(Uuid),

    #[error("follower lookup failed: {0}")]
    ResolverUnavailable(ResolveError),

    #[error("{failed} of {attempted} timeline writes failed for post {post_id}")]
    PartialFanoutFailure {
        post_id: Uuid,
        failed: usize,
        attempted: usize,
    },
}

impl FanoutError {
    /// Retriable errors leave the message unacknowledged for redelivery;
    /// the rest are dropped because no redelivery can fix them.
    pub fn is_retriable(&self) -> bool {
        match self {
            FanoutError::ResolverUnavailable(err) => err.is_transient(),
            FanoutError::PartialFanoutFailure { .. } => true,
            FanoutError::Decode(_) | FanoutError::AuthorNotFound(_) => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FanoutError::Decode(_) => "decode",
            FanoutError::AuthorNotFound(_) => "author_not_found",
            FanoutError::ResolverUnavailable(_) => "resolver_unavailable",
            FanoutError::PartialFanoutFailure { .. } => "partial_fanout_failure",
        }
    }
}

impl From<ResolveError> for FanoutError {
    fn from(err: ResolveError) -> Self {
        if err.is_transient() {
            return FanoutError::ResolverUnavailable(err);
        }
        match err {
            ResolveError::NotFound(author_id) => FanoutError::AuthorNotFound(author_id),
            other => FanoutError::ResolverUnavailable(other),
        }
    }
}

/// Broker-side failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("acknowledgement timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("unknown delivery {0}")]
    UnknownDelivery(String),

    #[error("transport task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retriable_classification() {
        let author = Uuid::new_v4();

        assert!(!FanoutError::Decode(DecodeError::EmptyPayload).is_retriable());
        assert!(!FanoutError::from(ResolveError::NotFound(author)).is_retriable());
        assert!(FanoutError::from(ResolveError::Timeout(Duration::from_secs(5))).is_retriable());
        assert!(
            FanoutError::from(ResolveError::Unavailable("refused".into())).is_retriable()
        );
        assert!(FanoutError::PartialFanoutFailure {
            post_id: Uuid::new_v4(),
            failed: 1,
            attempted: 3,
        }
        .is_retriable());
    }

    #[test]
    fn test_not_found_maps_to_author_not_found() {
        let author = Uuid::new_v4();
        match FanoutError::from(ResolveError::NotFound(author)) {
            FanoutError::AuthorNotFound(id) => assert_eq!(id, author),
            other => panic!("unexpected {:?}", other),
        }
    }
}
