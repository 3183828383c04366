//! Fallback values applied when optional variables are absent.

/// Listen address used when `BIND_ADDR` is unset.
pub const BIND_ADDR: &str = "0.0.0.0";
/// Storage root used when `STORAGE_DIR` is unset.
pub const STORAGE_DIR: &str = "storage";
/// Directory name (under the storage root) that holds raw downloads.
pub const RAW_DIR_NAME: &str = ".raw";
/// Per-batch concurrency ceiling.
pub const MAX_CONCURRENT_ITEMS: usize = 3;
/// Admission safety re-check period in milliseconds.
pub const DISPATCH_TICK_MS: u64 = 500;
/// Stall watchdog in seconds.
pub const STALL_TIMEOUT_SECS: u64 = 10;
/// Age after which settled batches are evicted, in seconds.
pub const BATCH_RETENTION_SECS: u64 = 86_400;
/// Registry sweep period in seconds.
pub const REGISTRY_SWEEP_SECS: u64 = 60;
/// Default yt-dlp executable.
pub const YTDLP_PATH: &str = "yt-dlp";
/// Default ffmpeg executable.
pub const FFMPEG_PATH: &str = "ffmpeg";
/// Fetcher-internal parallelism ceiling.
pub const FETCH_PARALLELISM: usize = 50;
