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

//! HTTP surface for tunequeue: batch submission, progress queries, artifact
//! retrieval, health, metrics, and a server-sent event feed.
//!
//! Layout: `error.rs` (server errors), `state.rs` (shared handler state),
//! `http/` (router, handlers, middleware).

pub mod error;
pub(crate) mod http;
pub(crate) mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
