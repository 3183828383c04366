//! Batch submission and progress handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path as AxumPath, State},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tunequeue_media_core::{BatchSnapshot, MediaError, extract_video_id};
use uuid::Uuid;

use crate::http::constants::{
    MSG_IDS_EMPTY, MSG_NO_SUCH_PROCESS, MSG_PLAYLIST_EMPTY, MSG_PLAYLIST_ID_MISSING,
    MSG_PROCESS_ID_MISSING,
};
use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SongsRequest {
    #[serde(default)]
    pub(crate) ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlaylistRequest {
    #[serde(default)]
    pub(crate) id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitResponse {
    pub(crate) batch_id: Uuid,
}

/// Either the batch snapshot or the literal "No such process" string.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ProgressResponse {
    Batch(BatchSnapshot),
    Missing(&'static str),
}

/// Malformed bodies are treated like bodies without the expected fields.
fn parse_body<T>(body: &Bytes) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    serde_json::from_slice(body).unwrap_or_else(|err| {
        debug!(error = %err, "request body is not valid json");
        T::default()
    })
}

pub(crate) async fn submit_songs(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let request: SongsRequest = parse_body(&body);
    let ids = request.ids.unwrap_or_default();
    if ids.is_empty() {
        return Err(ApiError::bad_request(MSG_IDS_EMPTY));
    }
    submit(&state, ids).await
}

pub(crate) async fn submit_playlist(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let request: PlaylistRequest = parse_body(&body);
    let Some(playlist_id) = request
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        return Err(ApiError::bad_request(MSG_PLAYLIST_ID_MISSING));
    };

    let urls = state.resolver.resolve(&playlist_id).await.map_err(|err| {
        let message = err
            .downcast_ref::<MediaError>()
            .map_or_else(|| err.to_string(), MediaError::detail);
        warn!(playlist_id = %playlist_id, error = %message, "playlist resolution failed");
        ApiError::bad_request(message)
    })?;

    let total = urls.len();
    let ids: Vec<String> = urls
        .iter()
        .filter_map(|url| {
            let id = extract_video_id(url);
            if id.is_none() {
                debug!(url = %url, "skipping unrecognised playlist entry");
            }
            id
        })
        .collect();
    if ids.is_empty() {
        return Err(ApiError::bad_request(MSG_PLAYLIST_EMPTY));
    }

    info!(
        playlist_id = %playlist_id,
        entries = total,
        recognised = ids.len(),
        "playlist resolved"
    );
    submit(&state, ids).await
}

async fn submit(state: &ApiState, ids: Vec<String>) -> Result<Json<SubmitResponse>, ApiError> {
    let batch_id = state
        .queue
        .submit(ids)
        .await
        .map_err(|err| ApiError::bad_request(err.reason()))?;
    Ok(Json(SubmitResponse { batch_id }))
}

pub(crate) async fn progress(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<String>,
) -> Json<ProgressResponse> {
    let snapshot = match Uuid::parse_str(id.trim()) {
        Ok(batch_id) => state.queue.get(batch_id).await,
        Err(_) => None,
    };
    Json(snapshot.map_or(
        ProgressResponse::Missing(MSG_NO_SUCH_PROCESS),
        ProgressResponse::Batch,
    ))
}

pub(crate) async fn progress_missing_id() -> ApiError {
    ApiError::bad_request(MSG_PROCESS_ID_MISSING)
}
