//! Failures that stop the service before or while it serves requests.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Fatal service errors returned from [`crate::run_app`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration was missing or invalid.
    #[error("configuration error during {operation}")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tunequeue_config::ConfigError,
    },
    /// The HTTP listener could not start or stopped.
    #[error("http listener error during {operation}")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: tunequeue_api::ApiServerError,
    },
    /// Logging or metrics could not be initialised.
    #[error("telemetry error during {operation}")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tunequeue_telemetry::TelemetryError,
    },
    /// Storage preparation failed.
    #[error("filesystem error during {operation}")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tunequeue_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: tunequeue_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tunequeue_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: Some(path.into()),
            source,
        }
    }
}
