use actix_web::HttpResponse;

use crate::metrics;

/// GET /health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "feed-service",
    }))
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
