//! Errors surfaced while running the HTTP listener.

use std::net::SocketAddr;

use thiserror::Error;

/// Result alias for API server operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// Listener failures; request-level failures are rendered as responses instead.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The listen address could not be bound.
    #[error("could not listen on {addr}")]
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The accept loop stopped with an error.
    #[error("http server stopped")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
