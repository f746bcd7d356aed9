//! Custom error types for Tabletalk
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Tabletalk operations
#[derive(Error, Debug)]
pub enum TabletalkError {
    /// Dataset path missing, unreadable, or malformed
    #[error("Dataset unavailable: {0}")]
    DataUnavailable(String),

    /// Chat-completion backend failures (network, auth, quota, bad body)
    #[error("Inference backend error: {0}")]
    Inference(String),

    /// Span open/close or flush failures
    #[error("Tracing backend error: {0}")]
    Tracing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Tabletalk operations
pub type Result<T> = std::result::Result<T, TabletalkError>;

impl TabletalkError {
    /// Create a dataset error
    pub fn data(msg: impl Into<String>) -> Self {
        Self::DataUnavailable(msg.into())
    }

    /// Create an inference backend error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a tracing backend error
    pub fn tracing(msg: impl Into<String>) -> Self {
        Self::Tracing(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from the tracing side channel
    pub fn is_tracing(&self) -> bool {
        matches!(self, Self::Tracing(_))
    }
}
