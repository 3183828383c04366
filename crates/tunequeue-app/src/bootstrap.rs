use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tunequeue_api::ApiServer;
use tunequeue_config::{AppConfig, ConfigLoader, LogFormatSetting};
use tunequeue_encode::{EncodeService, FfmpegTranscoder, Transcoder};
use tunequeue_events::EventBus;
use tunequeue_media_core::{BatchQueue, MediaFetcher, PlaylistResolver};
use tunequeue_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tunequeue_ytdlp::{YtDlpConfig, YtDlpFetcher, YtDlpResolver};

use crate::error::{AppError, AppResult};
use crate::orchestrator::BatchOrchestrator;

/// Dependencies required to bootstrap the tunequeue service.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    config: AppConfig,
    events: EventBus,
    metrics: Metrics,
    fetcher: Arc<dyn MediaFetcher>,
    resolver: Arc<dyn PlaylistResolver>,
    transcoder: Arc<dyn Transcoder>,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = ConfigLoader::new()
            .load()
            .map_err(|err| AppError::config("config_loader.load", err))?;
        let logging = logging_config(config.log_format);

        let events = EventBus::new();
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        let tools = &config.tools;
        let fetcher = YtDlpFetcher::new(YtDlpConfig {
            program: tools.ytdlp_path.clone(),
            raw_dir: config.storage.raw_dir(),
            quality: tools.fetch_quality,
            parallelism: tools.fetch_parallelism,
        });
        let resolver = YtDlpResolver::new(tools.ytdlp_path.clone());
        let transcoder = FfmpegTranscoder::new(tools.ffmpeg_path.clone());

        Ok(Self {
            logging,
            events,
            metrics,
            fetcher: Arc::new(fetcher),
            resolver: Arc::new(resolver),
            transcoder: Arc::new(transcoder),
            config,
        })
    }
}

/// Entry point for the tunequeue boot sequence.
///
/// # Errors
///
/// Returns an error if configuration is invalid, storage cannot be prepared, or
/// the HTTP listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    tunequeue_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("tunequeue");

    info!("tunequeue bootstrap starting");

    let BootstrapDependencies {
        logging: _,
        config,
        events,
        metrics,
        fetcher,
        resolver,
        transcoder,
    } = dependencies;

    prepare_storage(&config.storage.root)?;
    prepare_storage(&config.storage.raw_dir())?;

    let encoder = EncodeService::new(
        events.clone(),
        metrics.clone(),
        transcoder,
        config.storage.root.clone(),
    );
    let orchestrator = BatchOrchestrator::new(
        fetcher,
        encoder,
        events.clone(),
        metrics.clone(),
        &config.scheduler,
        config.server.base_url.clone(),
    );
    let sweeper = orchestrator.spawn_sweeper(config.scheduler.sweep_interval);
    if sweeper.is_none() {
        info!("batch retention disabled; settled batches are kept for the process lifetime");
    }

    let queue: Arc<dyn BatchQueue> = Arc::new(orchestrator);
    let api = ApiServer::new(
        queue,
        resolver,
        events,
        metrics,
        config.storage.root.clone(),
    );

    let addr = config.server.socket_addr();
    info!(addr = %addr, base_url = %config.server.base_url, "Listening on port {}", addr.port());

    let serve_result = api.serve(addr).await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))
}

fn prepare_storage(path: &Path) -> AppResult<()> {
    fs::create_dir_all(path).map_err(|source| AppError::io("storage.create_dir", path, source))
}

fn logging_config(format: Option<LogFormatSetting>) -> LoggingConfig<'static> {
    let format = match format {
        Some(LogFormatSetting::Json) => LogFormat::Json,
        Some(LogFormatSetting::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    LoggingConfig {
        format,
        ..LoggingConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn log_format_setting_overrides_inferred_format() {
        assert_eq!(
            logging_config(Some(LogFormatSetting::Json)).format,
            LogFormat::Json
        );
        assert_eq!(
            logging_config(Some(LogFormatSetting::Pretty)).format,
            LogFormat::Pretty
        );
        assert_eq!(logging_config(None).format, LogFormat::infer());
    }

    #[test]
    fn prepare_storage_creates_nested_directories() -> Result<()> {
        let temp = TempDir::new()?;
        let raw = temp.path().join("storage").join(".raw");
        prepare_storage(&raw)?;
        assert!(raw.is_dir());
        prepare_storage(&raw)?;
        Ok(())
    }

    #[test]
    fn prepare_storage_reports_the_failing_path() -> Result<()> {
        let temp = TempDir::new()?;
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"not a directory")?;
        let target = blocker.join("storage");

        let Err(AppError::Io { path, .. }) = prepare_storage(&target) else {
            anyhow::bail!("expected io error");
        };
        assert_eq!(path, Some(target));
        Ok(())
    }
}
