//! In-memory transport for tests and local runs
//!
//! Messages live on a single partition. A nacked message goes back to the
//! head of the queue, the way a Kafka seek makes it the next one read.
//! `next` returns `None` once the queue is empty unless the transport is
//! held open, in which case it waits for the next publish. `reject_nacks`
//! simulates a failed seek: the nack errors and the message stays in flight.

use super::{Delivery, DeliveryTag, EventTransport};
use crate::error::TransportError;
use async_trait::async_trait;
use event_schema::{PostCreatedEvent, RoutingKey, TWEET_EVENTS_TOPIC};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    queue: VecDeque<Delivery>,
    in_flight: HashMap<i64, Delivery>,
    next_offset: i64,
    acked: Vec<i64>,
    nacked: Vec<i64>,
    delivered: usize,
}

#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
    hold_open: AtomicBool,
    reject_nacks: AtomicBool,
    published: Notify,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `next` waiting on an empty queue instead of closing
    pub fn hold_open(&self, hold: bool) {
        self.hold_open.store(hold, Ordering::SeqCst);
        self.published.notify_waiters();
    }

    /// Make every `nack` fail without redelivering
    pub fn reject_nacks(&self, reject: bool) {
        self.reject_nacks.store(reject, Ordering::SeqCst);
    }

    /// Enqueue a raw message and return its offset
    pub fn publish_raw(&self, routing_key: Option<&str>, payload: Vec<u8>) -> i64 {
        let offset = {
            let mut state = self.lock();
            let offset = state.next_offset;
            state.next_offset += 1;
            state.queue.push_back(Delivery {
                tag: DeliveryTag {
                    topic: TWEET_EVENTS_TOPIC.to_string(),
                    partition: 0,
                    offset,
                },
                routing_key: routing_key.map(str::to_string),
                payload,
            });
            offset
        };
        self.published.notify_one();
        offset
    }

    /// Enqueue a `tweet.create` event
    pub fn publish(&self, event: &PostCreatedEvent) -> i64 {
        let payload = event.encode().unwrap_or_default();
        self.publish_raw(Some(RoutingKey::TweetCreate.as_str()), payload)
    }

    pub fn acked(&self) -> Vec<i64> {
        self.lock().acked.clone()
    }

    pub fn nacked(&self) -> Vec<i64> {
        self.lock().nacked.clone()
    }

    /// Total deliveries handed out, redeliveries included
    pub fn delivered(&self) -> usize {
        self.lock().delivered
    }

    /// Messages handed out but neither acked nor nacked
    pub fn in_flight(&self) -> Vec<i64> {
        let mut offsets: Vec<i64> = self.lock().in_flight.keys().copied().collect();
        offsets.sort_unstable();
        offsets
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test thread panicked mid-update
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn next(&self) -> Result<Option<Delivery>, TransportError> {
        loop {
            let published = self.published.notified();
            {
                let mut state = self.lock();
                if let Some(delivery) = state.queue.pop_front() {
                    state.delivered += 1;
                    state
                        .in_flight
                        .insert(delivery.tag.offset, delivery.clone());
                    return Ok(Some(delivery));
                }
            }

            if !self.hold_open.load(Ordering::SeqCst) {
                return Ok(None);
            }
            published.await;
        }
    }

    async fn ack(&self, tag: &DeliveryTag) -> Result<(), TransportError> {
        let mut state = self.lock();
        state
            .in_flight
            .remove(&tag.offset)
            .ok_or_else(|| TransportError::UnknownDelivery(tag.to_string()))?;
        state.acked.push(tag.offset);
        Ok(())
    }

    async fn nack(&self, tag: &DeliveryTag) -> Result<(), TransportError> {
        if self.reject_nacks.load(Ordering::SeqCst) {
            return Err(TransportError::Task(format!("seek to {} rejected", tag)));
        }

        let mut state = self.lock();
        let delivery = state
            .in_flight
            .remove(&tag.offset)
            .ok_or_else(|| TransportError::UnknownDelivery(tag.to_string()))?;
        state.nacked.push(tag.offset);
        state.queue.push_front(delivery);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_nack_redelivers_first() {
        let transport = MemoryTransport::new();
        let first = transport.publish(&PostCreatedEvent::new(Uuid::new_v4(), Uuid::new_v4()));
        let second = transport.publish(&PostCreatedEvent::new(Uuid::new_v4(), Uuid::new_v4()));

        let delivery = transport.next().await.unwrap().unwrap();
        assert_eq!(delivery.tag.offset, first);
        assert_eq!(delivery.routing_key.as_deref(), Some("tweet.create"));
        transport.nack(&delivery.tag).await.unwrap();

        let again = transport.next().await.unwrap().unwrap();
        assert_eq!(again.tag.offset, first);
        transport.ack(&again.tag).await.unwrap();

        let next = transport.next().await.unwrap().unwrap();
        assert_eq!(next.tag.offset, second);
        transport.ack(&next.tag).await.unwrap();

        assert!(transport.next().await.unwrap().is_none());
        assert_eq!(transport.acked(), vec![first, second]);
        assert_eq!(transport.nacked(), vec![first]);
        assert_eq!(transport.delivered(), 3);
    }

    #[tokio::test]
    async fn test_double_ack_is_rejected() {
        let transport = MemoryTransport::new();
        transport.publish_raw(None, b"{}".to_vec());

        let delivery = transport.next().await.unwrap().unwrap();
        transport.ack(&delivery.tag).await.unwrap();
        assert!(matches!(
            transport.ack(&delivery.tag).await,
            Err(TransportError::UnknownDelivery(_))
        ));
    }

    #[tokio::test]
    async fn test_held_open_transport_waits_for_publish() {
        let transport = std::sync::Arc::new(MemoryTransport::new());
        transport.hold_open(true);

        let reader = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.next().await })
        };
        tokio::task::yield_now().await;
        transport.publish_raw(Some("tweet.create"), b"{}".to_vec());

        let delivery = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(delivery.tag.offset, 0);
    }
}
