//! Feed read metrics
//!
//! Prometheus metrics for `GET /feed`

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_service_requests_total",
        "Feed reads by result (ok/empty/unavailable/bad_request)",
        &["result"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_READ_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_service_read_duration_seconds",
        "Timeline read plus hydration latency",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register feed read duration metric")
});

static HYDRATION_DEGRADED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_service_hydration_degraded_total",
        "Posts missing from a hydrated page, by reason (miss/failure)",
        &["reason"]
    )
    .expect("Failed to register hydration degraded metric")
});

pub fn record_request(result: &str) {
    FEED_REQUESTS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_read_duration(duration: Duration) {
    FEED_READ_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Count posts dropped from a page because hydration missed or failed
pub fn record_hydration_degraded(reason: &str, posts: usize) {
    HYDRATION_DEGRADED_TOTAL
        .with_label_values(&[reason])
        .inc_by(posts as u64);
}

/// Text exposition of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
