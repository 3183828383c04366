//! Playlist resolution through `yt-dlp --flat-playlist`.

use std::process::Stdio;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use tunequeue_media_core::{MediaError, PlaylistResolver, playlist_url};

use crate::process::playlist_args;

/// [`PlaylistResolver`] listing playlist entries with yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
}

impl YtDlpResolver {
    /// Resolver invoking `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl PlaylistResolver for YtDlpResolver {
    async fn resolve(&self, playlist_id: &str) -> Result<Vec<String>> {
        let url = playlist_url(playlist_id);
        debug!(playlist_id, "resolving playlist");
        let output = Command::new(&self.program)
            .args(playlist_args(&url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                operation: "resolve",
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or_default()
                .to_string();
            return Err(MediaError::ProcessFailed {
                operation: "resolve",
                status: output.status.code(),
                detail,
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
