//! Error types
//!
//! One enum per layer. Per-user failures (browser, extraction, staging) are logged
//! and isolated by the stages; storage failures propagate and abort the run.

use crate::types::Did;
use std::path::PathBuf;
use thiserror::Error;

/// Status store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store backend error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to encode or decode status record: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("User not found in store: {0}")]
    UserNotFound(Did),

    #[error("Status label cannot be indexed: {0}")]
    InvalidStatus(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Browser automation errors
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Element query for '{selector}' failed: {reason}")]
    Query { selector: String, reason: String },

    #[error("Network interception failed: {0}")]
    Interception(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Failed to persist session state to {}: {reason}", path.display())]
    SessionState { path: PathBuf, reason: String },
}

/// Extraction errors raised by a stage's extraction strategy
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("Nothing extracted: {0}")]
    Empty(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Staging area errors
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Staging IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Staging JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Resolved value is not a DID: {0}")]
    InvalidDid(String),
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        ResolveError::Network(err.to_string())
    }
}

/// Top-level error returned by the pipeline and the CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Browser error: {0}")]
    BrowserError(#[from] BrowserError),

    #[error("Staging error: {0}")]
    StagingError(#[from] StagingError),

    #[error("Resolve error: {0}")]
    ResolveError(#[from] ResolveError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
