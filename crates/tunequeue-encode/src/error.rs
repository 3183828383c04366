//! # Design
//!
//! - Provide structured, constant-message errors for the encode pipeline.
//! - Capture operation context (paths, fields) so failures can be reported per item.

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for post-processing operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Errors produced by post-processing.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// IO failures while interacting with the filesystem.
    #[error("encode io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Input validation failures.
    #[error("encode invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The encoder reported a failure.
    #[error("encode transcode failure")]
    Transcode {
        /// Source file handed to the encoder.
        path: PathBuf,
        /// Underlying encoder failure.
        source: Box<dyn Error + Send + Sync>,
    },
}

impl EncodeError {
    pub(crate) fn io(operation: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Human-readable detail used when the failure is reported against an item.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation, source, ..
            } => format!("{operation}: {source}"),
            Self::InvalidInput { field, reason, .. } => format!("{field} {reason}"),
            Self::Transcode { source, .. } => source.to_string(),
        }
    }
}
