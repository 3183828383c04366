#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Post-processing pipeline that normalises raw downloads into constant-bitrate MP3 artifacts.
//!
//! Layout: `service.rs` (step pipeline and file handling), `transcoder.rs`
//! (encoder seam and the ffmpeg adapter), `error.rs` (structured failures).

pub mod error;
pub mod service;
pub mod transcoder;

pub use error::{EncodeError, EncodeResult};
pub use service::{ARTIFACT_EXTENSION, Artifact, EncodeRequest, EncodeService};
pub use transcoder::{FfmpegTranscoder, TranscodeProfile, Transcoder};
