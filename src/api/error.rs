//! Server Error Types

use thiserror::Error;

/// Errors that stop the relay server
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;
