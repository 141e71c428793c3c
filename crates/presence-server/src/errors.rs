//! Server error types.

use thiserror::Error;

/// Errors that abort server startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A configuration value the relay cannot run with.
    #[error("invalid server config: {0}")]
    InvalidConfig(String),
    /// Other socket-level failure.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
