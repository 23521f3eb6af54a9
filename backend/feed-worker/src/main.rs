use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_worker::config::Config;
use feed_worker::health::{self, HealthState};
use feed_worker::transport::KafkaTransport;
use feed_worker::{FanoutProcessor, FeedWorker};
use grpc_clients::GrpcFollowerResolver;
use timeline_store::{RedisTimelineStore, TimelineStore};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
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
    info!(
        env = %config.app.env,
        topic = %config.kafka.topic,
        cap = config.timeline.cap,
        dedup = config.timeline.dedup,
        concurrency = config.fanout.concurrency,
        "Starting feed-worker"
    );

    let store: Arc<dyn TimelineStore> = Arc::new(
        RedisTimelineStore::connect(&config.redis.url, config.timeline.clone())
            .await
            .context("Failed to connect to Redis")?,
    );
    let resolver = Arc::new(
        GrpcFollowerResolver::from_config(&config.grpc)
            .context("Failed to configure user service client")?,
    );
    let transport = Arc::new(
        KafkaTransport::connect(&config.kafka, config.fanout.ack_timeout)
            .context("Failed to create Kafka consumer")?,
    );

    let processor = Arc::new(FanoutProcessor::new(
        resolver,
        Arc::clone(&store),
        config.fanout.concurrency,
    ));
    let worker = FeedWorker::new(transport, processor, config.worker_settings());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let health_state = web::Data::new(HealthState {
        store: Arc::clone(&store),
    });
    let server = HttpServer::new(move || {
        App::new()
            .app_data(health_state.clone())
            .configure(health::configure)
    })
    .bind((config.app.host.as_str(), config.app.port))
    .context("Failed to bind health endpoint")?
    .workers(1)
    .disable_signals()
    .run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    info!(
        "Health endpoint listening on {}:{}",
        config.app.host, config.app.port
    );

    // The worker only stops on its own when it can no longer consume safely;
    // exiting lets the group rebalance and redeliver from the last commit.
    let stopped_early = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, draining fan-out worker");
            let _ = shutdown_tx.send(true);
            if let Err(e) = (&mut worker_handle).await {
                tracing::error!("Fan-out worker task failed: {}", e);
            }
            false
        }
        result = &mut worker_handle => {
            if let Err(e) = result {
                tracing::error!("Fan-out worker task failed: {}", e);
            }
            true
        }
    };

    server_handle.stop(true).await;
    let _ = server_task.await;

    if stopped_early {
        anyhow::bail!("fan-out worker stopped before shutdown was requested");
    }

    info!("feed-worker stopped");
    Ok(())
}
