use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_service::config::Config;
use feed_service::middleware::{JwtAuthMiddleware, JwtVerifier, TokenVerifier};
use feed_service::{configure, TimelineReader};
use grpc_clients::GrpcPostHydrator;
use timeline_store::RedisTimelineStore;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Starting feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let store = Arc::new(
        RedisTimelineStore::connect(&config.redis.url, config.timeline.clone())
            .await
            .context("Failed to connect to Redis")?,
    );
    let hydrator = Arc::new(
        GrpcPostHydrator::from_config(&config.grpc)
            .context("Failed to configure tweet service client")?,
    );
    let reader = web::Data::new(TimelineReader::new(store, hydrator));

    let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::new(
        &config.auth.jwt_secret,
        config.auth.jwt_algorithm,
    ));

    info!(
        "Feed API listening on {}:{}",
        config.app.host, config.app.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(reader.clone())
            .configure(configure(JwtAuthMiddleware::new(Arc::clone(&verifier))))
    })
    .bind((config.app.host.as_str(), config.app.port))
    .context("Failed to bind HTTP listener")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("feed-service stopped");
    Ok(())
}
