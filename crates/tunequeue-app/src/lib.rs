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

//! Tunequeue application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring), `orchestrator/` (batch registry,
//! per-batch admission, stall detection, and post-processing hand-off).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level error type.
pub mod error;
/// Batch orchestration.
pub mod orchestrator;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
pub use orchestrator::BatchOrchestrator;
