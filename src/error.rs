//! Error types for the assistant core

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Model initialization error: {0}")]
    ModelInitError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Remote API returned HTTP {status}")]
    RemoteHttpError { status: u16 },

    #[error("Remote response error: {0}")]
    RemoteResponseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
