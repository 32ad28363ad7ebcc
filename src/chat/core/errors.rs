//! Error types for the chat subsystem.

use std::sync::Arc;

use thiserror::Error;

/// A file could not be read for encoding.
///
/// Cloneable so that a selection task and a waiting upload can observe the
/// outcome of the same read.
#[derive(Clone, Debug, Error)]
#[error("failed to read file {name}: {source}")]
pub struct ReadError {
    /// Display name of the file that failed.
    pub name: String,
    /// Underlying I/O failure.
    #[source]
    pub source: Arc<std::io::Error>,
}

impl ReadError {
    /// Wrap an I/O error for the named file.
    #[must_use]
    pub fn new(name: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            name: name.into(),
            source: Arc::new(source),
        }
    }
}

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// File unreadable or read interrupted.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// Query transport or remote failure (undifferentiated).
    #[error("query failed: {0}")]
    Query(String),
    /// Ingestion transport or remote failure (undifferentiated).
    #[error("ingestion failed: {0}")]
    Ingest(String),
    /// Liveness probe failure.
    #[error("backend probe failed: {0}")]
    Probe(String),
    /// HTTP client could not be constructed.
    #[error("http client error: {0}")]
    HttpClient(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Message violates the transcript invariants.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
