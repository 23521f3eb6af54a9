//! Consume loop and acknowledgement protocol
//!
//! | result of processing                 | action                  |
//! |--------------------------------------|-------------------------|
//! | all timeline writes succeeded        | ack                     |
//! | zero followers                       | ack                     |
//! | routing key not bound                | ack (skip)              |
//! | undecodable payload / unknown author | ack (drop)              |
//! | resolver unavailable, write failed   | backoff, then nack      |
//! | panic while processing               | backoff, then nack      |
//! | panic on attempt `panic_limit`       | ack (drop)              |
//! | nack rejected by the transport       | stop, leave unacked     |
//! | shutdown past the grace period       | abort, leave unacked    |
//!
//! A rejected nack stops the worker: on Kafka the consumer position has
//! already moved past the message, so acking anything later would commit
//! over it.

use crate::error::{FanoutError, TransportError};
use crate::fanout::{FanoutProcessor, FanoutReport};
use crate::metrics;
use crate::transport::{Delivery, DeliveryTag, EventTransport};
use event_schema::TopicPattern;
use resilience::{call_with_timeout, CallError, RedeliveryBackoff};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Routing keys this worker fans out
    pub binding: TopicPattern,
    pub backoff: RedeliveryBackoff,
    pub ack_timeout: Duration,
    pub drain_grace: Duration,
    /// Attempts that may panic before the message is dropped
    pub panic_limit: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            binding: TopicPattern::default(),
            backoff: RedeliveryBackoff::default(),
            ack_timeout: resilience::presets::broker_ack().duration,
            drain_grace: Duration::from_secs(10),
            panic_limit: 3,
        }
    }
}

/// How a single delivery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Every follower timeline was written (possibly zero of them)
    Applied,
    /// Routing key not selected by the binding
    Skipped,
    /// Can never succeed; acknowledged and discarded
    Dropped,
    /// Handed back for redelivery
    Retried,
    /// Shutdown interrupted processing; left unacknowledged
    Abandoned,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOutcome::Applied => "applied",
            MessageOutcome::Skipped => "skipped",
            MessageOutcome::Dropped => "dropped",
            MessageOutcome::Retried => "retried",
            MessageOutcome::Abandoned => "abandoned",
        }
    }
}

pub struct FeedWorker {
    transport: Arc<dyn EventTransport>,
    processor: Arc<FanoutProcessor>,
    settings: WorkerSettings,
    /// Consecutive failed attempts per delivery, at most one per partition
    attempts: HashMap<DeliveryTag, u32>,
}

impl FeedWorker {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        processor: Arc<FanoutProcessor>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            transport,
            processor,
            settings,
            attempts: HashMap::new(),
        }
    }

    /// Run until the transport closes or `shutdown` flips to `true`
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(binding = %self.settings.binding, "Fan-out worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                next = self.transport.next() => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    let outcome = self.handle(delivery, &mut shutdown).await;
                    metrics::record_message(outcome.as_str());
                    if outcome == MessageOutcome::Abandoned {
                        warn!("Stopping fan-out worker with an unacknowledged message");
                        break;
                    }
                }
                Ok(None) => {
                    info!("Event transport closed");
                    break;
                }
                Err(err) => {
                    error!("Event transport error: {}", err);
                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!("Fan-out worker stopped");
    }

    /// Process one delivery and settle it with the transport
    pub async fn handle(
        &mut self,
        delivery: Delivery,
        shutdown: &mut watch::Receiver<bool>,
    ) -> MessageOutcome {
        // A new offset on a partition means the old one was settled elsewhere
        self.attempts.retain(|pending, _| {
            pending == &delivery.tag
                || pending.topic != delivery.tag.topic
                || pending.partition != delivery.tag.partition
        });

        let outcome = self.settle(delivery, shutdown).await;
        if outcome == MessageOutcome::Abandoned {
            self.attempts.clear();
        }
        outcome
    }

    async fn settle(
        &mut self,
        delivery: Delivery,
        shutdown: &mut watch::Receiver<bool>,
    ) -> MessageOutcome {
        let tag = delivery.tag.clone();

        let bound = delivery
            .routing_key
            .as_deref()
            .is_some_and(|key| self.settings.binding.matches(key));
        if !bound {
            warn!(
                delivery = %tag,
                routing_key = ?delivery.routing_key,
                "Skipping message with unbound routing key"
            );
            self.settle_ack(&tag).await;
            return MessageOutcome::Skipped;
        }

        let processor = Arc::clone(&self.processor);
        let payload = delivery.payload;
        let mut task = tokio::spawn(async move { processor.process(&payload).await });

        let result = tokio::select! {
            result = &mut task => result,
            _ = shutdown_requested(shutdown) => {
                info!(delivery = %tag, grace = ?self.settings.drain_grace, "Draining in-flight message");
                match tokio::time::timeout(self.settings.drain_grace, &mut task).await {
                    Ok(result) => result,
                    Err(_) => {
                        task.abort();
                        warn!(delivery = %tag, "Grace period elapsed; leaving message unacknowledged");
                        return MessageOutcome::Abandoned;
                    }
                }
            }
        };

        match self.classify(&tag, result) {
            Verdict::Ack(outcome) => {
                self.attempts.remove(&tag);
                self.settle_ack(&tag).await;
                outcome
            }
            Verdict::Redeliver => self.redeliver(&tag, shutdown).await,
        }
    }

    fn classify(
        &self,
        tag: &DeliveryTag,
        result: Result<Result<FanoutReport, FanoutError>, JoinError>,
    ) -> Verdict {
        match result {
            Ok(Ok(report)) => {
                info!(
                    delivery = %tag,
                    author_id = %report.author_id,
                    post_id = %report.post_id,
                    followers = report.followers,
                    written = report.written,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Fan-out complete"
                );
                Verdict::Ack(MessageOutcome::Applied)
            }
            Ok(Err(err)) if err.is_retriable() => {
                warn!(delivery = %tag, kind = err.kind(), error = %err, "Fan-out failed; will redeliver");
                Verdict::Redeliver
            }
            Ok(Err(err)) => {
                error!(delivery = %tag, kind = err.kind(), error = %err, "Dropping message");
                Verdict::Ack(MessageOutcome::Dropped)
            }
            Err(join_err) => {
                let attempt = self.attempts.get(tag).copied().unwrap_or(0) + 1;
                if join_err.is_panic() && attempt >= self.settings.panic_limit {
                    error!(delivery = %tag, attempt, error = %join_err, "Fan-out task keeps panicking; dropping message");
                    return Verdict::Ack(MessageOutcome::Dropped);
                }
                error!(delivery = %tag, attempt, error = %join_err, "Fan-out task panicked; will redeliver");
                Verdict::Redeliver
            }
        }
    }

    async fn redeliver(
        &mut self,
        tag: &DeliveryTag,
        shutdown: &mut watch::Receiver<bool>,
    ) -> MessageOutcome {
        let attempt = {
            let attempts = self.attempts.entry(tag.clone()).or_insert(0);
            *attempts += 1;
            *attempts
        };
        let delay = self.settings.backoff.delay(attempt);
        debug!(delivery = %tag, attempt, delay_ms = delay.as_millis() as u64, "Backing off before redelivery");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_requested(shutdown) => {
                info!(delivery = %tag, "Shutdown during backoff; leaving message unacknowledged");
                return MessageOutcome::Abandoned;
            }
        }

        if let Err(err) = bounded(self.settings.ack_timeout, self.transport.nack(tag)).await {
            error!(delivery = %tag, error = %err, "Failed to hand message back for redelivery");
            return MessageOutcome::Abandoned;
        }
        MessageOutcome::Retried
    }

    async fn settle_ack(&self, tag: &DeliveryTag) {
        if let Err(err) = bounded(self.settings.ack_timeout, self.transport.ack(tag)).await {
            // Unacked messages come back; every outcome above is safe to repeat
            error!(delivery = %tag, error = %err, "Failed to acknowledge message");
        }
    }

    /// Deliveries with a pending failure count
    pub fn retrying(&self) -> usize {
        self.attempts.len()
    }
}

enum Verdict {
    Ack(MessageOutcome),
    Redeliver,
}

async fn bounded<F>(deadline: Duration, fut: F) -> Result<(), TransportError>
where
    F: std::future::Future<Output = Result<(), TransportError>>,
{
    call_with_timeout(deadline, fut)
        .await
        .map_err(|err| match err {
            CallError::Timeout(elapsed) => TransportError::Timeout(elapsed),
            CallError::Failed(e) => e,
        })
}

/// Resolves once shutdown is requested or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
