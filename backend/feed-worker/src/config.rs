use anyhow::{Context, Result};
use event_schema::{TopicPattern, TWEET_EVENTS_TOPIC};
use grpc_clients::GrpcConfig;
use resilience::RedeliveryBackoff;
use std::time::Duration;
use timeline_store::TimelineConfig;

use crate::worker::WorkerSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub kafka: KafkaConfig,
    pub redis: RedisConfig,
    pub timeline: TimelineConfig,
    pub grpc: GrpcConfig,
    pub fanout: FanoutConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    /// Port of the health/metrics endpoint
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    pub topic: String,
    /// Routing keys selected by this worker (`tweet.create`, `tweet.*`, `#`)
    pub binding_pattern: TopicPattern,
    pub auto_offset_reset: String,
    pub session_timeout_ms: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Concurrent timeline writes per message
    pub concurrency: usize,
    /// How long an in-flight message may keep running after shutdown starts
    pub drain_grace: Duration,
    /// Deadline for an offset commit or seek
    pub ack_timeout: Duration,
    pub backoff: RedeliveryBackoff,
    /// Panicking attempts before a message is dropped
    pub panic_limit: u32,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            drain_grace: Duration::from_secs(10),
            ack_timeout: resilience::presets::broker_ack().duration,
            backoff: RedeliveryBackoff::default(),
            panic_limit: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let fanout_defaults = FanoutConfig::default();
        let timeline_defaults = TimelineConfig::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8081".to_string())
                    .parse()
                    .context("APP_PORT must be a port number")?,
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS").context("KAFKA_BROKERS must be set")?,
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "feed-worker".to_string()),
                topic: std::env::var("KAFKA_TWEET_EVENTS_TOPIC")
                    .unwrap_or_else(|_| TWEET_EVENTS_TOPIC.to_string()),
                binding_pattern: std::env::var("FEED_BINDING_PATTERN")
                    .map(TopicPattern::new)
                    .unwrap_or_default(),
                auto_offset_reset: std::env::var("KAFKA_AUTO_OFFSET_RESET")
                    .unwrap_or_else(|_| "earliest".to_string()),
                session_timeout_ms: std::env::var("KAFKA_SESSION_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(45_000),
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            timeline: TimelineConfig {
                cap: std::env::var("FEED_TIMELINE_CAP")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|cap| *cap > 0)
                    .unwrap_or(timeline_defaults.cap),
                key_prefix: std::env::var("FEED_KEY_PREFIX")
                    .unwrap_or(timeline_defaults.key_prefix),
                dedup: std::env::var("FEED_DEDUP")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(timeline_defaults.dedup),
                op_timeout: std::env::var("REDIS_OP_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(timeline_defaults.op_timeout),
            },
            grpc: GrpcConfig::from_env(),
            fanout: FanoutConfig {
                concurrency: std::env::var("FANOUT_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(fanout_defaults.concurrency),
                drain_grace: std::env::var("SHUTDOWN_GRACE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(fanout_defaults.drain_grace),
                ack_timeout: std::env::var("KAFKA_ACK_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(fanout_defaults.ack_timeout),
                backoff: fanout_defaults.backoff,
                panic_limit: std::env::var("FANOUT_PANIC_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(fanout_defaults.panic_limit),
            },
        })
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            binding: self.kafka.binding_pattern.clone(),
            backoff: self.fanout.backoff,
            ack_timeout: self.fanout.ack_timeout,
            drain_grace: self.fanout.drain_grace,
            panic_limit: self.fanout.panic_limit,
        }
    }
}
