// src/error.rs

use thiserror::Error;

/// Core error types for the installer engine
#[derive(Error, Debug)]
pub enum Error {
    /// Index cache database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file errors
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Initialization error
    #[error("Failed to initialize: {0}")]
    InitError(String),

    /// Malformed package metadata
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The package database backend could not be loaded
    #[error("Package database backend failed to initialize: {0}")]
    BackendInit(String),

    /// A package or file that was asked for does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Batch index outside the queued archives
    #[error("Invalid package index {index} (batch holds {len} packages)")]
    InvalidIndex { index: usize, len: usize },

    /// Operation not allowed in the current worker state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The privileged installer could not be started
    #[error("Installer error: {0}")]
    InstallerError(String),
}

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
