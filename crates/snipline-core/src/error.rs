use thiserror::Error;

/// Top-level error type for Snipline.
///
/// Subsystem crates wrap this in their own error types (for example the
/// action crate's `ActionError::Storage`) so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SniplineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for SniplineError {
    fn from(err: toml::de::Error) -> Self {
        SniplineError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SniplineError {
    fn from(err: toml::ser::Error) -> Self {
        SniplineError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SniplineError {
    fn from(err: serde_json::Error) -> Self {
        SniplineError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Snipline operations.
pub type Result<T> = std::result::Result<T, SniplineError>;
