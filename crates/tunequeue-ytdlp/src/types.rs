//! Adapter configuration.

use std::path::PathBuf;

use tunequeue_media_core::FetchQuality;

/// Settings shared by the yt-dlp fetcher and resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpConfig {
    /// yt-dlp executable.
    pub program: String,
    /// Directory receiving raw downloads.
    pub raw_dir: PathBuf,
    /// Requested audio quality.
    pub quality: FetchQuality,
    /// Maximum concurrent yt-dlp processes per batch.
    pub parallelism: usize,
}

impl YtDlpConfig {
    /// Configuration with the default quality and parallelism.
    #[must_use]
    pub fn new(program: impl Into<String>, raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            raw_dir: raw_dir.into(),
            quality: FetchQuality::default(),
            parallelism: 50,
        }
    }
}
