//! Fan-out Metrics
//!
//! Prometheus metrics for the fan-out worker

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_worker_messages_total",
        "Messages handled by the fan-out worker, by outcome",
        &["outcome"]
    )
    .expect("Failed to register feed worker messages metric")
});

static TIMELINE_WRITES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_worker_timeline_writes_total",
        "Timeline prepends issued during fan-out (success/error)",
        &["result"]
    )
    .expect("Failed to register feed worker timeline writes metric")
});

static FANOUT_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_worker_fanout_duration_seconds",
        "Time from follower lookup to the last timeline write",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register feed worker fan-out duration metric")
});

static FOLLOWERS_PER_POST: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_worker_followers_per_post",
        "Distinct followers resolved per post",
        vec![0.0, 1.0, 10.0, 100.0, 1_000.0, 10_000.0, 100_000.0]
    )
    .expect("Failed to register feed worker followers metric")
});

/// Record how a message ended (applied/skipped/dropped/retried/abandoned)
pub fn record_message(outcome: &str) {
    MESSAGES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_timeline_writes(result: &str, count: usize) {
    TIMELINE_WRITES_TOTAL
        .with_label_values(&[result])
        .inc_by(count as u64);
}

pub fn record_fanout(followers: usize, duration: Duration) {
    FOLLOWERS_PER_POST.observe(followers as f64);
    FANOUT_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Text exposition of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
