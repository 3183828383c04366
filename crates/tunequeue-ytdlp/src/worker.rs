#![allow(clippy::redundant_pub_crate)]

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Weak};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};
use tunequeue_media_core::{FetchEventSink, FetchRequest, MediaError};
use uuid::Uuid;

use crate::command::FetchCommand;
use crate::process::{OutputLine, fetch_args, parse_output_line};
use crate::types::YtDlpConfig;

/// Parallelism ceilings, one per batch with fetches outstanding.
#[derive(Default)]
struct BatchPermits {
    by_batch: HashMap<Uuid, Weak<Semaphore>>,
}

impl BatchPermits {
    fn for_batch(&mut self, batch_id: Uuid, parallelism: usize) -> Arc<Semaphore> {
        self.by_batch.retain(|_, permits| permits.strong_count() > 0);
        if let Some(permits) = self.by_batch.get(&batch_id).and_then(Weak::upgrade) {
            return permits;
        }
        let permits = Arc::new(Semaphore::new(parallelism.max(1)));
        self.by_batch.insert(batch_id, Arc::downgrade(&permits));
        permits
    }
}

pub(crate) fn spawn(config: YtDlpConfig, mut commands: mpsc::Receiver<FetchCommand>) {
    tokio::spawn(async move {
        let config = Arc::new(config);
        let mut permits = BatchPermits::default();
        while let Some(command) = commands.recv().await {
            match command {
                FetchCommand::Fetch { request, sink } => {
                    let config = Arc::clone(&config);
                    let batch_permits = permits.for_batch(request.batch_id, config.parallelism);
                    tokio::spawn(async move {
                        let Ok(_permit) = batch_permits.acquire_owned().await else {
                            return;
                        };
                        run_fetch(&config, &request, sink).await;
                    });
                }
            }
        }
        debug!("yt-dlp worker stopped");
    });
}

async fn run_fetch(config: &YtDlpConfig, request: &FetchRequest, sink: FetchEventSink) {
    let item_id = request.item_id.as_str();
    if let Err(err) = tokio::fs::create_dir_all(&config.raw_dir).await {
        warn!(item_id = %item_id, error = %err, "failed to prepare raw download directory");
        let _ = sink.error(item_id, err.to_string());
        return;
    }

    match download(config, request, &sink).await {
        Ok(OutputLine::Finished { file, metadata }) => {
            debug!(item_id = %item_id, file = %file.display(), "raw download finished");
            let _ = sink.finished(item_id, file, metadata);
        }
        Ok(OutputLine::Progress(_)) => {}
        Err(err) => {
            warn!(item_id = %item_id, error = %err, "yt-dlp fetch failed");
            let _ = sink.error(item_id, err.detail());
        }
    }
}

async fn download(
    config: &YtDlpConfig,
    request: &FetchRequest,
    sink: &FetchEventSink,
) -> Result<OutputLine, MediaError> {
    let item_id = request.item_id.as_str();
    let mut child = Command::new(&config.program)
        .args(fetch_args(request, &config.raw_dir, config.quality))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| MediaError::Spawn {
            operation: "fetch",
            program: config.program.clone(),
            source,
        })?;

    let stderr = child.stderr.take().map(|stream| tokio::spawn(last_line(stream)));
    let mut finished = None;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_output_line(&line) {
                Some(OutputLine::Progress(percentage)) => {
                    let _ = sink.progress(item_id, percentage);
                }
                Some(done @ OutputLine::Finished { .. }) => finished = Some(done),
                None => {}
            }
        }
    }

    let status = child.wait().await.map_err(|source| MediaError::Spawn {
        operation: "fetch.wait",
        program: config.program.clone(),
        source,
    })?;
    let detail = match stderr {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    match finished {
        Some(done) if status.success() => Ok(done),
        _ => Err(MediaError::ProcessFailed {
            operation: "fetch",
            status: status.code(),
            detail,
        }),
    }
}

async fn last_line<R>(stream: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    let mut last = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            last = line.trim().to_string();
        }
    }
    last
}
