//! Per-route request counting.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use tunequeue_telemetry::Metrics;

/// Count each request under its matched route template and response status.
pub(crate) async fn record_http_request(
    State(metrics): State<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_owned(), |matched| matched.as_str().to_owned());
    let response = next.run(request).await;
    metrics.inc_http_request(&route, response.status().as_u16());
    response
}
