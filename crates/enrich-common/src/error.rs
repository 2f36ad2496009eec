//! Error types for contact enrichment

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for enrichment operations
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Main error type for enrichment
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from enrichment endpoint: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed enrichment response: {0}")]
    MalformedResponse(String),
}

impl EnrichError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came back from the enrichment call itself.
    ///
    /// These are the failures the pipeline retries and reports to the throttle.
    pub fn is_enrichment_failure(&self) -> bool {
        matches!(
            self,
            EnrichError::Network(_) | EnrichError::Http { .. } | EnrichError::MalformedResponse(_)
        )
    }
}
