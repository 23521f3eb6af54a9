//! Kafka transport
//!
//! Offsets are committed manually. Ack commits `offset + 1` for the
//! message's partition; nack seeks the partition back to the message so the
//! consumer reads it again. The worker processes one message at a time, so
//! per-partition (and therefore per-author) order is kept.

use super::{Delivery, DeliveryTag, EventTransport};
use crate::config::KafkaConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use event_schema::EVENT_TYPE_HEADER;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct KafkaTransport {
    consumer: Arc<StreamConsumer>,
    seek_timeout: Duration,
}

impl KafkaTransport {
    pub fn connect(config: &KafkaConfig, seek_timeout: Duration) -> Result<Self, TransportError> {
        info!(
            "Starting tweet events consumer (topic: {}, group: {}, binding: {})",
            config.topic, config.group_id, config.binding_pattern
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set("max.poll.interval.ms", "300000")
            .create()?;

        consumer.subscribe(&[&config.topic])?;

        Ok(Self {
            consumer: Arc::new(consumer),
            seek_timeout,
        })
    }

    fn header_value<'a>(message: &'a BorrowedMessage<'a>, key: &str) -> Option<&'a str> {
        message
            .headers()
            .and_then(|headers| {
                headers
                    .iter()
                    .find(|header| header.key == key)
                    .and_then(|header| header.value)
            })
            .and_then(|value| std::str::from_utf8(value).ok())
    }
}

#[async_trait]
impl EventTransport for KafkaTransport {
    async fn next(&self) -> Result<Option<Delivery>, TransportError> {
        let record = self.consumer.recv().await?;

        let delivery = Delivery {
            tag: DeliveryTag {
                topic: record.topic().to_string(),
                partition: record.partition(),
                offset: record.offset(),
            },
            routing_key: Self::header_value(&record, EVENT_TYPE_HEADER).map(str::to_string),
            payload: record.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        };

        debug!(delivery = %delivery.tag, routing_key = ?delivery.routing_key, "Received message");
        Ok(Some(delivery))
    }

    async fn ack(&self, tag: &DeliveryTag) -> Result<(), TransportError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(&tag.topic, tag.partition, Offset::Offset(tag.offset + 1))?;
        self.consumer.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }

    async fn nack(&self, tag: &DeliveryTag) -> Result<(), TransportError> {
        let consumer = Arc::clone(&self.consumer);
        let tag = tag.clone();
        let timeout = self.seek_timeout;

        // seek blocks on the broker round-trip
        tokio::task::spawn_blocking(move || {
            consumer.seek(&tag.topic, tag.partition, Offset::Offset(tag.offset), timeout)
        })
        .await
        .map_err(|e| TransportError::Task(e.to_string()))??;

        Ok(())
    }
}
