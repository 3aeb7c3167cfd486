//! Error types for storewatch
//!
//! This module defines all error types used throughout the crate.
//!
//! A failed probe is *not* an error at the engine level: the probe adapter
//! turns every [`Error`] returned by a [`StoreProbe`](crate::StoreProbe) into
//! an unavailable outcome. Errors only surface for collaborator writes,
//! snapshot reads and configuration.

use thiserror::Error;

/// Result type alias for storewatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for storewatch
#[derive(Error, Debug)]
pub enum Error {
    /// Store probe errors (package lookup failed)
    #[error("Store probe error: {0}")]
    Probe(String),

    /// Tabular store errors (read or write failed)
    #[error("Tabular store error: {0}")]
    TabularStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential loading errors
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Package, worksheet or cell not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Collaborator-specific error
    #[error("Collaborator error ({name}): {message}")]
    Collaborator {
        /// Collaborator name
        name: String,
        /// Error message
        message: String,
    },

    /// A bounded operation did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a store probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a tabular store error
    pub fn tabular_store(msg: impl Into<String>) -> Self {
        Self::TabularStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credentials error
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a collaborator-specific error
    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_error_names_the_collaborator() {
        let err = Error::collaborator("google_sheets", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "Collaborator error (google_sheets): quota exceeded"
        );
    }

    #[test]
    fn anyhow_errors_convert_to_other() {
        let err: Error = anyhow::anyhow!("boom").into();
        assert!(matches!(err, Error::Other(ref m) if m == "boom"));
    }
}
