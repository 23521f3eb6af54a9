//! Fan-out worker
//!
//! Consumes post creation events and writes the new post id into the home
//! timeline of every follower of the author. Delivery is at-least-once: a
//! message is acknowledged only after every timeline write succeeded, or when
//! it can never succeed (bad payload, unknown author, unrelated routing key).

pub mod config;
pub mod error;
pub mod fanout;
pub mod health;
pub mod metrics;
pub mod transport;
pub mod worker;

pub use error::{FanoutError, TransportError};
pub use fanout::{FanoutProcessor, FanoutReport};
pub use transport::{Delivery, DeliveryTag, EventTransport};
pub use worker::{FeedWorker, MessageOutcome, WorkerSettings};
