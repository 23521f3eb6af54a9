use actix_web::{error::QueryPayloadError, web, HttpRequest, HttpResponse};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::AuthenticatedUser;
use crate::models::FeedQueryParams;
use crate::services::TimelineReader;

/// GET /feed?limit=&offset=
///
/// Newest-first page of the caller's home timeline.
pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    user: AuthenticatedUser,
    reader: web::Data<TimelineReader>,
) -> Result<HttpResponse> {
    let (limit, offset) = query.page().map_err(|msg| {
        metrics::record_request("bad_request");
        AppError::BadRequest(msg)
    })?;

    debug!(
        "Getting feed for user: user={} username={} limit={} offset={}",
        user.user_id, user.username, limit, offset
    );

    let response = reader
        .read_page(user.user_id, limit, offset)
        .await
        .map_err(|e| {
            metrics::record_request("unavailable");
            e
        })?;

    metrics::record_request(if response.count == 0 { "empty" } else { "ok" });
    Ok(HttpResponse::Ok().json(response))
}

/// Malformed query strings answer with the JSON error body
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req: &HttpRequest| {
        metrics::record_request("bad_request");
        AppError::BadRequest(err.to_string()).into()
    })
}
