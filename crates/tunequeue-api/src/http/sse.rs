//! Server-sent events streaming of the domain event bus.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{self, Sse},
};
use futures_util::Stream;
use tracing::error;
use tunequeue_events::{EventBus, EventId};

use crate::http::constants::{HEADER_LAST_EVENT_ID, SSE_KEEP_ALIVE_SECS};
use crate::state::ApiState;

pub(crate) async fn stream_events(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>> + Send> {
    let last_id = last_event_id(&headers);
    Sse::new(event_sse_stream(state.events.clone(), last_id)).keep_alive(
        sse::KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}

fn last_event_id(headers: &HeaderMap) -> Option<EventId> {
    headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok())
}

pub(crate) fn event_sse_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl Stream<Item = Result<sse::Event, Infallible>> + Send {
    stream! {
        let mut events = bus.subscribe(since);
        while let Some(envelope) = events.next().await {
            match serde_json::to_string(&envelope) {
                Ok(payload) => {
                    yield Ok(sse::Event::default()
                        .id(envelope.id.to_string())
                        .event(envelope.event.kind())
                        .data(payload));
                }
                Err(err) => error!(error = %err, "failed to serialise SSE event payload"),
            }
        }
    }
}
