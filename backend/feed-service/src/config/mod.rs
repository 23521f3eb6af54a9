use anyhow::{Context, Result};
use grpc_clients::GrpcConfig;
use jsonwebtoken::Algorithm;
use std::str::FromStr;
use std::time::Duration;
use timeline_store::TimelineConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub redis: RedisConfig,
    pub timeline: TimelineConfig,
    pub grpc: GrpcConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let timeline_defaults = TimelineConfig::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .context("APP_PORT must be a port number")?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            timeline: TimelineConfig {
                key_prefix: std::env::var("FEED_KEY_PREFIX")
                    .unwrap_or(timeline_defaults.key_prefix),
                op_timeout: std::env::var("REDIS_OP_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(timeline_defaults.op_timeout),
                ..timeline_defaults
            },
            grpc: GrpcConfig::from_env(),
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
                jwt_algorithm: parse_jwt_algorithm(
                    &std::env::var("JWT_ALGO").unwrap_or_else(|_| "HS256".to_string()),
                )?,
            },
        })
    }
}

/// Tokens are verified against `JWT_SECRET`, so only HMAC algorithms apply
pub fn parse_jwt_algorithm(value: &str) -> Result<Algorithm> {
    let algorithm = Algorithm::from_str(value)
        .with_context(|| format!("JWT_ALGO {} is not a JWT algorithm", value))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => anyhow::bail!("JWT_ALGO must be HS256, HS384 or HS512, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_algorithms_are_accepted() {
        assert_eq!(parse_jwt_algorithm("HS256").unwrap(), Algorithm::HS256);
        assert_eq!(parse_jwt_algorithm("HS512").unwrap(), Algorithm::HS512);
    }

    #[test]
    fn test_key_pair_algorithms_are_rejected() {
        for value in ["RS256", "ES256", "EdDSA", "none"] {
            assert!(parse_jwt_algorithm(value).is_err(), "accepted {}", value);
        }
    }
}
