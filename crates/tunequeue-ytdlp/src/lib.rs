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

//! yt-dlp adapters implementing the media fetch and playlist resolution seams.
//!
//! Layout: `adapter.rs` (`YtDlpFetcher` command front), `worker.rs` (bounded
//! fetch worker), `process.rs` (argument building and output parsing),
//! `resolver.rs` (`YtDlpResolver`), `types.rs` (adapter configuration).

pub mod adapter;
mod command;
pub mod process;
pub mod resolver;
pub mod types;
mod worker;

pub use adapter::YtDlpFetcher;
pub use resolver::YtDlpResolver;
pub use types::YtDlpConfig;
