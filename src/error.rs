//! Custom error types for the chat client.

use thiserror::Error;

/// Unified error type propagated through every chat operation.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Assistant API error: {0}")]
    Api(String),

    #[error("Input validation error: {0}")]
    InputValidation(String),

    #[error("Vector store not found: {0}")]
    StoreNotFound(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Not connected: call connect() before chatting")]
    NotConnected,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
