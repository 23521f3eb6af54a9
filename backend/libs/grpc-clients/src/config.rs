/// gRPC Configuration
///
/// Endpoints and transport settings for the user and tweet services.
use std::env;
use std::fs;
use std::time::Duration;
use thiserror::Error;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

#[derive(Debug, Error)]
pub enum GrpcConfigError {
    #[error("invalid gRPC endpoint {url}: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("failed to read TLS material: {0}")]
    Tls(#[from] std::io::Error),

    #[error("invalid TLS configuration: {0}")]
    TlsConfig(tonic::transport::Error),
}

#[derive(Debug, Clone)]
pub struct GrpcConfig {
    /// User Service endpoint (followers)
    pub user_service_url: String,

    /// Tweet Service endpoint (post hydration)
    pub tweet_service_url: String,

    /// gRPC connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Deadline for follower lookups
    pub follower_timeout: Duration,

    /// Deadline for post hydration
    pub hydration_timeout: Duration,

    /// HTTP/2 keep-alive interval in seconds
    pub keepalive_interval_secs: u64,

    /// HTTP/2 keep-alive timeout in seconds
    pub keepalive_timeout_secs: u64,

    /// Enable TLS for gRPC clients
    pub tls_enabled: bool,
    /// Optional custom domain name for TLS SNI/verification
    pub tls_domain_name: Option<String>,
    /// Path to CA certificate (PEM)
    pub tls_ca_cert_path: Option<String>,
}

impl GrpcConfig {
    /// Load configuration from environment variables
    /// Falls back to defaults for development
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            user_service_url: env::var("GRPC_USER_SERVICE_URL")
                .unwrap_or(defaults.user_service_url),
            tweet_service_url: env::var("GRPC_TWEET_SERVICE_URL")
                .unwrap_or(defaults.tweet_service_url),
            connection_timeout_secs: env::var("GRPC_CONNECTION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.connection_timeout_secs),
            follower_timeout: env::var("GRPC_FOLLOWER_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.follower_timeout),
            hydration_timeout: env::var("GRPC_HYDRATION_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.hydration_timeout),
            keepalive_interval_secs: env::var("GRPC_KEEPALIVE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.keepalive_interval_secs),
            keepalive_timeout_secs: env::var("GRPC_KEEPALIVE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.keepalive_timeout_secs),
            tls_enabled: env::var("GRPC_TLS_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            tls_domain_name: env::var("GRPC_TLS_DOMAIN_NAME").ok(),
            tls_ca_cert_path: env::var("GRPC_TLS_CA_CERT_PATH").ok(),
        }
    }

    /// Build a tonic Endpoint from URL with timeouts/keepalive and optional TLS
    pub fn make_endpoint(&self, url: &str) -> Result<Endpoint, GrpcConfigError> {
        let mut ep = Endpoint::from_shared(url.to_string())
            .map_err(|source| GrpcConfigError::InvalidEndpoint {
                url: url.to_string(),
                source,
            })?
            .connect_timeout(Duration::from_secs(self.connection_timeout_secs))
            .http2_keep_alive_interval(Duration::from_secs(self.keepalive_interval_secs))
            .keep_alive_timeout(Duration::from_secs(self.keepalive_timeout_secs))
            .tcp_nodelay(true);

        if self.tls_enabled {
            let mut tls = ClientTlsConfig::new();

            if let Some(ca_path) = &self.tls_ca_cert_path {
                let ca_pem = fs::read(ca_path)?;
                tls = tls.ca_certificate(Certificate::from_pem(ca_pem));
            }

            if let Some(domain) = &self.tls_domain_name {
                tls = tls.domain_name(domain);
            }

            ep = ep.tls_config(tls).map_err(GrpcConfigError::TlsConfig)?;
        }

        Ok(ep)
    }

    /// Channel that connects on first use, so startup does not depend on
    /// collaborator availability
    pub fn lazy_channel(&self, url: &str) -> Result<Channel, GrpcConfigError> {
        Ok(self.make_endpoint(url)?.connect_lazy())
    }
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            user_service_url: "http://user-service:50051".to_string(),
            tweet_service_url: "http://tweet-service:50051".to_string(),
            connection_timeout_secs: 5,
            follower_timeout: resilience::presets::follower_resolver().duration,
            hydration_timeout: resilience::presets::post_hydration().duration,
            keepalive_interval_secs: 30,
            keepalive_timeout_secs: 10,
            tls_enabled: false,
            tls_domain_name: None,
            tls_ca_cert_path: None,
        }
    }
}
