//! End-to-end fan-out scenarios against in-memory collaborators
//!
//! Transport, follower graph and timeline store are all in-memory doubles,
//! so these tests exercise the real worker loop and ack protocol.

use async_trait::async_trait;
use event_schema::PostCreatedEvent;
use feed_worker::transport::MemoryTransport;
use feed_worker::{EventTransport, FanoutProcessor, FeedWorker, MessageOutcome, WorkerSettings};
use grpc_clients::{FollowerResolver, MemoryFollowerResolver, ResolveError};
use resilience::RedeliveryBackoff;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timeline_store::{MemoryTimelineStore, TimelineConfig, TimelineStore};
use tokio::sync::watch;
use uuid::Uuid;

fn fast_settings() -> WorkerSettings {
    WorkerSettings {
        backoff: RedeliveryBackoff {
            base: Duration::from_millis(1),
            multiplier: 2.0,
            max: Duration::from_millis(10),
            jitter: 0.0,
        },
        ..Default::default()
    }
}

struct Harness {
    transport: Arc<MemoryTransport>,
    resolver: Arc<MemoryFollowerResolver>,
    store: Arc<MemoryTimelineStore>,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(MemoryTimelineStore::default())
    }

    fn with_store(store: MemoryTimelineStore) -> Self {
        Self {
            transport: Arc::new(MemoryTransport::new()),
            resolver: Arc::new(MemoryFollowerResolver::new()),
            store: Arc::new(store),
        }
    }

    fn worker(&self) -> FeedWorker {
        self.worker_with(self.resolver.clone(), fast_settings())
    }

    fn worker_with(
        &self,
        resolver: Arc<dyn FollowerResolver>,
        settings: WorkerSettings,
    ) -> FeedWorker {
        let processor = Arc::new(FanoutProcessor::new(resolver, self.store.clone(), 8));
        FeedWorker::new(self.transport.clone(), processor, settings)
    }

    /// Run the worker until the transport is drained
    async fn drain(&self) {
        let (_tx, rx) = watch::channel(false);
        self.worker().run(rx).await;
    }
}

#[tokio::test]
async fn test_post_reaches_every_follower_and_not_the_author() {
    let h = Harness::new();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(a, vec![b, c]);

    let post = Uuid::new_v4();
    let offset = h.transport.publish(&PostCreatedEvent::new(a, post));
    h.drain().await;

    assert_eq!(h.store.read(b, 50, 0).await.unwrap(), vec![post]);
    assert_eq!(h.store.read(c, 50, 0).await.unwrap(), vec![post]);
    assert!(h.store.read(a, 50, 0).await.unwrap().is_empty());
    assert_eq!(h.transport.acked(), vec![offset]);
    assert!(h.transport.nacked().is_empty());
}

#[tokio::test]
async fn test_zero_followers_is_acked_with_no_writes() {
    let h = Harness::new();
    let author = Uuid::new_v4();
    h.resolver.set_followers(author, vec![]);

    let offset = h
        .transport
        .publish(&PostCreatedEvent::new(author, Uuid::new_v4()));
    h.drain().await;

    assert_eq!(h.transport.acked(), vec![offset]);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_unknown_author_is_dropped() {
    let h = Harness::new();

    let offset = h
        .transport
        .publish(&PostCreatedEvent::new(Uuid::new_v4(), Uuid::new_v4()));
    h.drain().await;

    assert_eq!(h.transport.acked(), vec![offset]);
    assert!(h.transport.nacked().is_empty());
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_poison_message_does_not_block_the_partition() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);

    let poison = h
        .transport
        .publish_raw(Some("tweet.create"), b"invalid json".to_vec());
    let empty = h.transport.publish_raw(Some("tweet.create"), Vec::new());
    let post = Uuid::new_v4();
    let good = h.transport.publish(&PostCreatedEvent::new(author, post));
    h.drain().await;

    assert_eq!(h.transport.acked(), vec![poison, empty, good]);
    assert_eq!(h.store.snapshot(follower), vec![post]);
    // Poison messages never reach the resolver
    assert_eq!(h.resolver.calls(), 1);
}

#[tokio::test]
async fn test_unbound_routing_keys_are_skipped() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    let payload = PostCreatedEvent::new(author, Uuid::new_v4())
        .encode()
        .unwrap();

    let delete = h
        .transport
        .publish_raw(Some("tweet.delete"), payload.clone());
    let missing = h.transport.publish_raw(None, payload);
    h.drain().await;

    assert_eq!(h.transport.acked(), vec![delete, missing]);
    assert_eq!(h.resolver.calls(), 0);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_wildcard_binding_selects_other_actions() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    let post = Uuid::new_v4();
    let payload = PostCreatedEvent::new(author, post).encode().unwrap();
    h.transport.publish_raw(Some("tweet.repost"), payload);

    let settings = WorkerSettings {
        binding: event_schema::TopicPattern::new("tweet.*"),
        ..fast_settings()
    };
    let (_tx, rx) = watch::channel(false);
    h.worker_with(h.resolver.clone(), settings).run(rx).await;

    assert_eq!(h.store.snapshot(follower), vec![post]);
}

#[tokio::test]
async fn test_resolver_outage_then_recovery() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    h.resolver.fail_next(2);

    let post = Uuid::new_v4();
    let offset = h.transport.publish(&PostCreatedEvent::new(author, post));
    h.drain().await;

    assert_eq!(h.transport.nacked(), vec![offset, offset]);
    assert_eq!(h.transport.acked(), vec![offset]);
    assert_eq!(h.transport.delivered(), 3);
    assert_eq!(h.store.snapshot(follower), vec![post]);
}

#[tokio::test]
async fn test_partial_write_failure_is_retried_without_duplicates() {
    let h = Harness::new();
    let (author, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![b, c]);
    h.store.fail_writes_for(c);

    let post = Uuid::new_v4();
    h.transport.publish(&PostCreatedEvent::new(author, post));

    let mut worker = h.worker();
    let (_tx, mut rx) = watch::channel(false);

    let first = h.transport.next().await.unwrap().unwrap();
    assert_eq!(worker.handle(first, &mut rx).await, MessageOutcome::Retried);
    assert_eq!(worker.retrying(), 1);
    assert_eq!(h.store.snapshot(b), vec![post]);
    assert!(h.store.snapshot(c).is_empty());

    h.store.heal(c);
    let second = h.transport.next().await.unwrap().unwrap();
    assert_eq!(worker.handle(second, &mut rx).await, MessageOutcome::Applied);
    assert_eq!(worker.retrying(), 0);

    // The retry rewrote b; dedup keeps a single entry
    assert_eq!(h.store.snapshot(b), vec![post]);
    assert_eq!(h.store.snapshot(c), vec![post]);
}

#[tokio::test]
async fn test_redelivered_event_is_idempotent() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);

    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    h.transport.publish(&PostCreatedEvent::new(author, p1));
    h.transport.publish(&PostCreatedEvent::new(author, p2));
    h.transport.publish(&PostCreatedEvent::new(author, p2));
    h.drain().await;

    assert_eq!(h.store.snapshot(follower), vec![p2, p1]);
}

#[tokio::test]
async fn test_cap_and_order_through_the_worker() {
    let h = Harness::with_store(MemoryTimelineStore::new(TimelineConfig {
        cap: 10,
        ..Default::default()
    }));
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);

    let posts: Vec<Uuid> = (0..12).map(|_| Uuid::new_v4()).collect();
    for post in &posts {
        h.transport.publish(&PostCreatedEvent::new(author, *post));
    }
    h.drain().await;

    let expected: Vec<Uuid> = posts.iter().rev().take(10).copied().collect();
    assert_eq!(h.store.snapshot(follower), expected);
}

/// Panics on the first lookup, then delegates
struct PanicOnce {
    panicked: AtomicBool,
    inner: Arc<MemoryFollowerResolver>,
}

#[async_trait]
impl FollowerResolver for PanicOnce {
    async fn get_followers(&self, author_id: Uuid) -> Result<Vec<Uuid>, ResolveError> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("follower lookup bug");
        }
        self.inner.get_followers(author_id).await
    }
}

#[tokio::test]
async fn test_single_panic_is_redelivered_and_applied() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    let resolver = Arc::new(PanicOnce {
        panicked: AtomicBool::new(false),
        inner: h.resolver.clone(),
    });

    let post = Uuid::new_v4();
    let offset = h.transport.publish(&PostCreatedEvent::new(author, post));
    let (_tx, rx) = watch::channel(false);
    h.worker_with(resolver, fast_settings()).run(rx).await;

    assert_eq!(h.transport.nacked(), vec![offset]);
    assert_eq!(h.transport.acked(), vec![offset]);
    assert_eq!(h.store.snapshot(follower), vec![post]);
}

/// Panics on every lookup for one author, delegates for everyone else
struct PanicFor {
    author: Uuid,
    inner: Arc<MemoryFollowerResolver>,
}

#[async_trait]
impl FollowerResolver for PanicFor {
    async fn get_followers(&self, author_id: Uuid) -> Result<Vec<Uuid>, ResolveError> {
        if author_id == self.author {
            panic!("follower lookup bug for {}", author_id);
        }
        self.inner.get_followers(author_id).await
    }
}

#[tokio::test]
async fn test_repeated_panic_is_dropped_after_limit() {
    let h = Harness::new();
    let (bad_author, author, follower) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(bad_author, vec![follower]);
    h.resolver.set_followers(author, vec![follower]);
    let resolver = Arc::new(PanicFor {
        author: bad_author,
        inner: h.resolver.clone(),
    });

    let bad = h
        .transport
        .publish(&PostCreatedEvent::new(bad_author, Uuid::new_v4()));
    let post = Uuid::new_v4();
    let good = h.transport.publish(&PostCreatedEvent::new(author, post));

    let settings = WorkerSettings {
        panic_limit: 3,
        ..fast_settings()
    };
    let (_tx, rx) = watch::channel(false);
    h.worker_with(resolver, settings).run(rx).await;

    // Two redeliveries, then the third panic drops it and the partition moves on
    assert_eq!(h.transport.nacked(), vec![bad, bad]);
    assert_eq!(h.transport.acked(), vec![bad, good]);
    assert_eq!(h.store.snapshot(follower), vec![post]);
}

#[tokio::test]
async fn test_rejected_nack_stops_before_later_messages() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    h.resolver.fail_next(1);
    h.transport.reject_nacks(true);

    let first = h
        .transport
        .publish(&PostCreatedEvent::new(author, Uuid::new_v4()));
    h.transport
        .publish(&PostCreatedEvent::new(author, Uuid::new_v4()));
    h.drain().await;

    // Nothing committed past the failed message; the later one is untouched
    assert!(h.transport.acked().is_empty());
    assert_eq!(h.transport.in_flight(), vec![first]);
    assert_eq!(h.transport.pending(), 1);
    assert!(h.store.snapshot(follower).is_empty());
}

#[tokio::test]
async fn test_retry_state_is_bounded_per_partition() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    h.transport.publish(&PostCreatedEvent::new(author, Uuid::new_v4()));

    let mut worker = h.worker();
    let (_tx, mut rx) = watch::channel(false);

    h.resolver.set_unavailable(true);
    let delivery = h.transport.next().await.unwrap().unwrap();
    assert_eq!(worker.handle(delivery, &mut rx).await, MessageOutcome::Retried);
    assert_eq!(worker.retrying(), 1);

    // The redelivery is settled by another consumer; this one reads further on
    let redelivered = h.transport.next().await.unwrap().unwrap();
    h.transport.ack(&redelivered.tag).await.unwrap();

    h.resolver.set_unavailable(false);
    h.transport.publish(&PostCreatedEvent::new(author, Uuid::new_v4()));
    let delivery = h.transport.next().await.unwrap().unwrap();
    assert_eq!(worker.handle(delivery, &mut rx).await, MessageOutcome::Applied);
    assert_eq!(worker.retrying(), 0);

    h.resolver.set_unavailable(true);
    h.transport.reject_nacks(true);
    h.transport.publish(&PostCreatedEvent::new(author, Uuid::new_v4()));
    let delivery = h.transport.next().await.unwrap().unwrap();
    assert_eq!(worker.handle(delivery, &mut rx).await, MessageOutcome::Abandoned);
    assert_eq!(worker.retrying(), 0);
}

/// Answers after a fixed delay
struct SlowResolver {
    delay: Duration,
    inner: Arc<MemoryFollowerResolver>,
}

#[async_trait]
impl FollowerResolver for SlowResolver {
    async fn get_followers(&self, author_id: Uuid) -> Result<Vec<Uuid>, ResolveError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_followers(author_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_message_finish_within_grace() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    h.transport.hold_open(true);
    let resolver = Arc::new(SlowResolver {
        delay: Duration::from_secs(2),
        inner: h.resolver.clone(),
    });

    let post = Uuid::new_v4();
    let offset = h.transport.publish(&PostCreatedEvent::new(author, post));

    let (tx, rx) = watch::channel(false);
    let settings = WorkerSettings {
        drain_grace: Duration::from_secs(10),
        ..fast_settings()
    };
    let worker = tokio::spawn(h.worker_with(resolver, settings).run(rx));

    tokio::time::sleep(Duration::from_millis(500)).await;
    tx.send(true).unwrap();
    worker.await.unwrap();

    assert_eq!(h.transport.acked(), vec![offset]);
    assert_eq!(h.store.snapshot(follower), vec![post]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_past_grace_leaves_message_unacked() {
    let h = Harness::new();
    let (author, follower) = (Uuid::new_v4(), Uuid::new_v4());
    h.resolver.set_followers(author, vec![follower]);
    h.transport.hold_open(true);
    let resolver = Arc::new(SlowResolver {
        delay: Duration::from_secs(600),
        inner: h.resolver.clone(),
    });

    let offset = h
        .transport
        .publish(&PostCreatedEvent::new(author, Uuid::new_v4()));

    let (tx, rx) = watch::channel(false);
    let settings = WorkerSettings {
        drain_grace: Duration::from_secs(1),
        ..fast_settings()
    };
    let worker = tokio::spawn(h.worker_with(resolver, settings).run(rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();
    worker.await.unwrap();

    assert!(h.transport.acked().is_empty());
    assert!(h.transport.nacked().is_empty());
    assert_eq!(h.transport.in_flight(), vec![offset]);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_worker_stops_on_shutdown() {
    let h = Harness::new();
    h.transport.hold_open(true);

    let (tx, rx) = watch::channel(false);
    let worker = tokio::spawn(h.worker().run(rx));

    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send(true).unwrap();
    worker.await.unwrap();

    assert_eq!(h.transport.delivered(), 0);
}
