/// Default deadlines for the feed pipeline's collaborators
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Follower lookups over gRPC
///
/// Fan-out is blocked on this call, keep it short so an outage turns into
/// a redelivery quickly.
pub fn follower_resolver() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(5),
    }
}

/// Post hydration over gRPC (read path)
pub fn post_hydration() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(3),
    }
}

/// Single Redis timeline operation
pub fn timeline_store() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(2),
    }
}

/// Broker acknowledgement (offset commit or seek)
pub fn broker_ack() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_deadline_is_tighter_than_resolver() {
        assert!(timeline_store().duration < follower_resolver().duration);
        assert!(post_hydration().duration <= follower_resolver().duration);
    }
}
