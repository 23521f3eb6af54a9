//! Event transport
//!
//! A transport hands out one delivery at a time and is told afterwards
//! whether it was applied (`ack`) or must come back later (`nack`). A
//! delivery that is neither acked nor nacked is redelivered after a restart
//! or a consumer-group rebalance.

use crate::error::TransportError;
use async_trait::async_trait;
use std::fmt;

pub mod kafka;
pub mod memory;

pub use kafka::KafkaTransport;
pub use memory::MemoryTransport;

/// Position of a delivery in the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    /// Value of the `event_type` header, if present
    pub routing_key: Option<String>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Wait for the next delivery. `None` means the transport is closed.
    async fn next(&self) -> Result<Option<Delivery>, TransportError>;

    /// The delivery was applied (or deliberately dropped); never redeliver it
    async fn ack(&self, tag: &DeliveryTag) -> Result<(), TransportError>;

    /// The delivery failed; hand it back for redelivery
    async fn nack(&self, tag: &DeliveryTag) -> Result<(), TransportError>;
}
