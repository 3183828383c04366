//! Error types for media adapters and batch admission.

use std::error::Error;

use thiserror::Error;

/// Primary error type for media adapter operations.
#[derive(Debug, Error)]
pub enum MediaError {
    /// External process could not be spawned.
    #[error("media process failed to start")]
    Spawn {
        /// Operation identifier.
        operation: &'static str,
        /// Program that failed to start.
        program: String,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// External process exited unsuccessfully.
    #[error("media process exited unsuccessfully")]
    ProcessFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Exit code when available.
        status: Option<i32>,
        /// Last diagnostic line emitted by the process.
        detail: String,
    },
    /// Adapter worker is no longer accepting commands.
    #[error("media worker unavailable")]
    WorkerUnavailable {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Output produced by the adapter could not be interpreted.
    #[error("media output could not be parsed")]
    InvalidOutput {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying parse failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl MediaError {
    /// Human-readable detail suitable for per-item error reporting.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::ProcessFailed { detail, .. } if !detail.is_empty() => detail.clone(),
            Self::Spawn { program, source, .. } => format!("{program}: {source}"),
            Self::InvalidOutput { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}

/// Convenience alias for media adapter results.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors returned when admitting a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Request payload was empty or malformed.
    #[error("invalid batch input")]
    InvalidInput {
        /// Client-facing reason.
        reason: &'static str,
    },
}

impl QueueError {
    /// Client-facing message for the failure.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidInput { reason } => reason,
        }
    }
}
