//! Error types shared across crates

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown intent tag: {0}")]
    UnknownIntent(String),

    #[error("Invalid gateway event: {0}")]
    InvalidEvent(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias using [`CoreError`]
pub type Result<T> = std::result::Result<T, CoreError>;
