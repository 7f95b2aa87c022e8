//! Common error types for MindPulse

use thiserror::Error;

/// Common result type for MindPulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across MindPulse services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}
