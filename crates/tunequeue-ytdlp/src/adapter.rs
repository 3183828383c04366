//! Command front for the yt-dlp fetch worker.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tunequeue_media_core::{FetchEventSink, FetchRequest, MediaFetcher};

use crate::command::FetchCommand;
use crate::types::YtDlpConfig;
use crate::worker;

const COMMAND_BUFFER: usize = 128;

/// [`MediaFetcher`] backed by yt-dlp child processes.
#[derive(Clone)]
pub struct YtDlpFetcher {
    commands: mpsc::Sender<FetchCommand>,
}

impl YtDlpFetcher {
    /// Spawn the background worker and return a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: YtDlpConfig) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        worker::spawn(config, rx);
        Self { commands }
    }

    async fn send_command(&self, command: FetchCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|err| anyhow!("failed to enqueue yt-dlp command: {err}"))
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, request: FetchRequest, sink: FetchEventSink) -> Result<()> {
        self.send_command(FetchCommand::Fetch { request, sink })
            .await
    }
}
