//! Custom error types for darkscope.

use thiserror::Error;

/// Failures raised by a host page while reading or mutating its state.
///
/// These never escape a collection pass: the collector treats every one of
/// them as "rule did not fire".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for darkscope operations.
#[derive(Error, Debug)]
pub enum DarkscopeError {
    #[error("Page has no document to inspect")]
    MissingDocument,

    #[error("Change monitor is already observing")]
    AlreadyObserving,

    #[error("Change monitor requires a running tokio runtime")]
    NoRuntime,

    #[error("Invalid color value: {0:?}")]
    InvalidColor(String),

    #[error("Invalid page snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] color_eyre::Report),
}

/// Result type alias using DarkscopeError
pub type Result<T> = std::result::Result<T, DarkscopeError>;

impl DarkscopeError {
    pub fn invalid_color(value: impl Into<String>) -> Self {
        Self::InvalidColor(value.into())
    }

    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

// Wraps in Other for generic I/O errors
impl From<std::io::Error> for DarkscopeError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(color_eyre::Report::from(err))
    }
}
