use actix_web::{web, HttpResponse};
use std::sync::Arc;
use timeline_store::TimelineStore;
use tracing::warn;

use crate::metrics;

pub struct HealthState {
    pub store: Arc<dyn TimelineStore>,
}

/// GET /health
///
/// Healthy while the timeline store answers; the broker and follower
/// resolver are allowed to be down (messages simply wait).
pub async fn health(state: web::Data<HealthState>) -> HttpResponse {
    match state.store.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "service": "feed-worker",
        })),
        Err(e) => {
            warn!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "service": "feed-worker",
                "error": e.to_string(),
            }))
        }
    }
}

/// GET /metrics
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().body(format!("error: {}", e)),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_endpoint));
}
