use thiserror::Error;

/// Error type for configuration and logging setup.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid log level '{level}': {reason}")]
    LogLevel { level: String, reason: String },

    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
