//! Timeline read API
//!
//! Serves `GET /feed` from the per-user timelines written by feed-worker.
//! This crate only reads timelines; it never writes them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::configure;
pub use services::TimelineReader;
