//! HTTP surface modules (router, handlers, middleware).

#![allow(clippy::redundant_pub_crate)]

/// Batch submission and progress handlers.
pub(crate) mod batches;
/// Shared constants and header names.
pub(crate) mod constants;
/// Error responses.
pub(crate) mod errors;
/// Artifact retrieval.
pub(crate) mod files;
/// Health and metrics endpoints.
pub(crate) mod health;
/// Router construction and server host.
pub(crate) mod router;
/// Server-sent event streaming.
pub(crate) mod sse;
/// Metrics middleware for HTTP requests.
pub(crate) mod telemetry;
