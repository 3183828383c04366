//! Typed configuration models.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tunequeue_media_core::FetchQuality;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::validate::{
    parse_base_url, parse_bind_addr, parse_millis, parse_non_empty, parse_port,
    parse_positive_usize, parse_retention, parse_secs,
};

/// Fully validated service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// HTTP listener and link settings.
    pub server: ServerConfig,
    /// Filesystem layout.
    pub storage: StorageConfig,
    /// Batch scheduling knobs.
    pub scheduler: SchedulerConfig,
    /// External tool settings.
    pub tools: ToolConfig,
    /// Explicit log format override, inferred from the build when absent.
    pub log_format: Option<LogFormatSetting>,
}

/// HTTP listener and link settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: IpAddr,
    /// Listen port.
    pub port: u16,
    /// Prefix for artifact links, always ending in `/`.
    pub base_url: String,
}

impl ServerConfig {
    /// Socket address the API should bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Filesystem layout for artifacts and intermediate downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Public storage root holding encoded artifacts.
    pub root: PathBuf,
}

impl StorageConfig {
    /// Directory receiving raw fetch output before post-processing.
    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(defaults::RAW_DIR_NAME)
    }
}

/// Batch scheduling knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Per-batch in-flight ceiling.
    pub max_concurrent_items: usize,
    /// Admission safety re-check period.
    pub dispatch_tick: Duration,
    /// Per-item stall watchdog.
    pub stall_timeout: Duration,
    /// Age after which settled batches are evicted; `None` keeps them forever.
    pub batch_retention: Option<Duration>,
    /// Registry sweep period.
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_items: defaults::MAX_CONCURRENT_ITEMS,
            dispatch_tick: Duration::from_millis(defaults::DISPATCH_TICK_MS),
            stall_timeout: Duration::from_secs(defaults::STALL_TIMEOUT_SECS),
            batch_retention: Some(Duration::from_secs(defaults::BATCH_RETENTION_SECS)),
            sweep_interval: Duration::from_secs(defaults::REGISTRY_SWEEP_SECS),
        }
    }
}

/// External tool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// yt-dlp executable.
    pub ytdlp_path: String,
    /// ffmpeg executable.
    pub ffmpeg_path: String,
    /// Requested audio quality.
    pub fetch_quality: FetchQuality,
    /// Fetcher-internal parallelism ceiling.
    pub fetch_parallelism: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: defaults::YTDLP_PATH.to_string(),
            ffmpeg_path: defaults::FFMPEG_PATH.to_string(),
            fetch_quality: FetchQuality::default(),
            fetch_parallelism: defaults::FETCH_PARALLELISM,
        }
    }
}

/// Log output format requested through `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-friendly output.
    Pretty,
}

impl AppConfig {
    /// Build a configuration from a variable lookup.
    ///
    /// Blank values are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when `BASE_URL` or `PORT` is absent and
    /// `ConfigError::InvalidField` when any value fails validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| lookup(field).filter(|value| !value.trim().is_empty());

        let base_url = get("BASE_URL").ok_or(ConfigError::MissingField { field: "BASE_URL" })?;
        let port = get("PORT").ok_or(ConfigError::MissingField { field: "PORT" })?;

        let server = ServerConfig {
            bind_addr: parse_bind_addr(
                "BIND_ADDR",
                get("BIND_ADDR").as_deref().unwrap_or(defaults::BIND_ADDR),
            )?,
            port: parse_port("PORT", &port)?,
            base_url: parse_base_url("BASE_URL", &base_url)?,
        };

        let storage = StorageConfig {
            root: PathBuf::from(
                get("STORAGE_DIR").unwrap_or_else(|| defaults::STORAGE_DIR.to_string()),
            ),
        };

        let mut scheduler = SchedulerConfig::default();
        if let Some(value) = get("MAX_CONCURRENT_ITEMS") {
            scheduler.max_concurrent_items = parse_positive_usize("MAX_CONCURRENT_ITEMS", &value)?;
        }
        if let Some(value) = get("DISPATCH_TICK_MS") {
            scheduler.dispatch_tick = parse_millis("DISPATCH_TICK_MS", &value)?;
        }
        if let Some(value) = get("STALL_TIMEOUT_SECS") {
            scheduler.stall_timeout = parse_secs("STALL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("BATCH_RETENTION_SECS") {
            scheduler.batch_retention = parse_retention("BATCH_RETENTION_SECS", &value)?;
        }
        if let Some(value) = get("REGISTRY_SWEEP_SECS") {
            scheduler.sweep_interval = parse_secs("REGISTRY_SWEEP_SECS", &value)?;
        }

        let mut tools = ToolConfig::default();
        if let Some(value) = get("YTDLP_PATH") {
            tools.ytdlp_path = parse_non_empty("YTDLP_PATH", &value)?;
        }
        if let Some(value) = get("FFMPEG_PATH") {
            tools.ffmpeg_path = parse_non_empty("FFMPEG_PATH", &value)?;
        }
        if let Some(value) = get("FETCH_QUALITY") {
            tools.fetch_quality = FetchQuality::parse(&value).ok_or_else(|| {
                ConfigError::invalid("FETCH_QUALITY", &value, "must be 'lowest' or 'highest'")
            })?;
        }
        if let Some(value) = get("FETCH_PARALLELISM") {
            tools.fetch_parallelism = parse_positive_usize("FETCH_PARALLELISM", &value)?;
        }

        let log_format = get("LOG_FORMAT")
            .map(|value| match value.trim().to_ascii_lowercase().as_str() {
                "json" => Ok(LogFormatSetting::Json),
                "pretty" => Ok(LogFormatSetting::Pretty),
                _ => Err(ConfigError::invalid(
                    "LOG_FORMAT",
                    &value,
                    "must be 'json' or 'pretty'",
                )),
            })
            .transpose()?;

        Ok(Self {
            server,
            storage,
            scheduler,
            tools,
            log_format,
        })
    }
}
