//! Artifact retrieval.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{
        StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use crate::http::constants::{
    ARTIFACT_EXTENSION, CONTENT_TYPE_MPEG, MSG_FILE_LOCATION_MISSING, MSG_FILE_NOT_FOUND,
};
use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn song(
    State(state): State<Arc<ApiState>>,
    AxumPath(name): AxumPath<String>,
) -> Result<Response, ApiError> {
    let Some(path) = artifact_path(&state.storage_root, &name) else {
        debug!(name = %name, "rejected artifact name");
        return Err(ApiError::not_found(MSG_FILE_NOT_FOUND));
    };

    let file = File::open(&path).await.map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            ApiError::not_found(MSG_FILE_NOT_FOUND)
        } else {
            error!(path = %path.display(), error = %err, "failed to open artifact");
            ApiError::internal("Failed to read file")
        }
    })?;
    let metadata = file.metadata().await.map_err(|err| {
        error!(path = %path.display(), error = %err, "failed to stat artifact");
        ApiError::internal("Failed to read file")
    })?;
    if !metadata.is_file() {
        return Err(ApiError::not_found(MSG_FILE_NOT_FOUND));
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, CONTENT_TYPE_MPEG)
        .header(CONTENT_LENGTH, metadata.len())
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|err| {
            error!(error = %err, "failed to build artifact response");
            ApiError::internal("Failed to read file")
        })
}

pub(crate) async fn song_missing_name() -> ApiError {
    ApiError::bad_request(MSG_FILE_LOCATION_MISSING)
}

/// Resolve `<root>/<name>.mp3`; names that could escape the root are refused.
fn artifact_path(root: &Path, name: &str) -> Option<PathBuf> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return None;
    }
    Some(root.join(format!("{name}.{ARTIFACT_EXTENSION}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_appends_extension() {
        let root = Path::new("storage");
        assert_eq!(
            artifact_path(root, "6f1c"),
            Some(PathBuf::from("storage/6f1c.mp3"))
        );
    }

    #[test]
    fn artifact_path_rejects_traversal() {
        let root = Path::new("storage");
        assert_eq!(artifact_path(root, "../secret"), None);
        assert_eq!(artifact_path(root, "a/b"), None);
        assert_eq!(artifact_path(root, "a\\b"), None);
        assert_eq!(artifact_path(root, ".."), None);
        assert_eq!(artifact_path(root, "  "), None);
    }
}
