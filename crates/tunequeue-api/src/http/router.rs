//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};
use tunequeue_events::EventBus;
use tunequeue_media_core::{BatchQueue, PlaylistResolver};
use tunequeue_telemetry::{Metrics, build_sha};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::batches::{progress, progress_missing_id, submit_playlist, submit_songs};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::files::{song, song_missing_name};
use crate::http::health::{health, metrics};
use crate::http::sse::stream_events;
use crate::http::telemetry::record_http_request;
use crate::state::ApiState;

/// Axum router wrapper that hosts the tunequeue API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the API server over the batch queue, playlist resolver, and
    /// shared telemetry. Artifacts are served from `storage_root`.
    #[must_use]
    pub fn new(
        queue: Arc<dyn BatchQueue>,
        resolver: Arc<dyn PlaylistResolver>,
        events: EventBus,
        telemetry: Metrics,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        let state = Arc::new(ApiState::new(
            queue,
            resolver,
            events,
            telemetry.clone(),
            storage_root.into(),
        ));

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    let status = response.status().as_u16();
                    span.record("status_code", status);
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(tunequeue_telemetry::set_request_id_layer())
            .layer(tunequeue_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(axum::middleware::from_fn_with_state(
                telemetry,
                record_http_request,
            ));

        let router = Self::routes().route_layer(layered).with_state(state);
        Self { router }
    }

    fn routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/songs", post(submit_songs))
            .route("/playlist", post(submit_playlist))
            .route("/progress/", get(progress_missing_id))
            .route("/progress/{id}", get(progress))
            .route("/song/", get(song_missing_name))
            .route("/song/{name}", get(song))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/events", get(stream_events))
    }

    /// Serve the API using the configured router on the supplied address.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "Started on {}", addr.port());
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}
