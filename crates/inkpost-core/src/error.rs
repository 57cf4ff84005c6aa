//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MIME assembly failed.
    #[error("MIME error: {0}")]
    Mime(#[from] inkpost_mime::Error),

    /// Configuration file could not be parsed.
    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),

    /// Request failed validation.
    #[error("Invalid request: {}", crate::validation::describe(.0))]
    Validation(Vec<crate::validation::ValidationError>),

    /// Scheduled email not found.
    #[error("Scheduled email not found: {0}")]
    ScheduleNotFound(i64),

    /// Stored row could not be decoded.
    #[error("Corrupt record in {table}: {reason}")]
    CorruptRecord {
        /// Table the row came from.
        table: &'static str,
        /// What failed to decode.
        reason: String,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
