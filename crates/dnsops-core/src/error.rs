//! Error types for the DNSOps reconciler.

use thiserror::Error;

/// Result type alias for DNSOps operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNSOps reconciler.
///
/// Source and provider failures fail the current tick; the control loop
/// logs them and continues. Configuration errors abort at startup.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors: unknown enum values, missing required fields,
    /// mutually exclusive fields set, malformed filters.
    #[error("configuration error: {0}")]
    Config(String),

    /// A source could not produce its endpoints.
    #[error("source {name} unavailable: {message}")]
    Source {
        /// Source name
        name: String,
        /// Error message
        message: String,
    },

    /// A provider could not fetch zones or records, or the API is
    /// unreachable.
    #[error("provider {provider} unavailable: {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Network-related errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source error.
    pub fn source(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            name: source.into(),
            message: message.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
