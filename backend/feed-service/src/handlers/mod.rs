pub mod feed;
pub mod health;

pub use feed::{get_feed, query_config};
pub use health::{health_check, metrics_endpoint};

use actix_web::web;

use crate::middleware::JwtAuthMiddleware;

/// Route table: `/feed` behind bearer auth, `/health` and `/metrics` open
pub fn configure(auth: JwtAuthMiddleware) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(query_config())
            .route("/health", web::get().to(health_check))
            .route("/metrics", web::get().to(metrics_endpoint))
            .service(
                web::resource("/feed")
                    .wrap(auth)
                    .route(web::get().to(get_feed)),
            );
    }
}
