use thiserror::Error;
use std::time::Duration;

/// Core error types for the Petstore store suite
#[derive(Error, Debug)]
pub enum StoreTestError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Assertion error: {0}")]
    Assertion(#[from] AssertionError),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Raised by the retrying convenience calls when the service answered with
    /// a status they do not accept. Retried like any other failure.
    #[error("Unexpected response: {status_line}")]
    UnexpectedStatus { status_line: String },

    #[error("Operation interrupted")]
    Interrupted,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Transport-level errors. HTTP status codes never produce one of these.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP client initialization failed: {0}")]
    ClientBuild(String),

    #[error("Failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Assertion-specific errors
#[derive(Error, Debug)]
pub enum AssertionError {
    #[error("Assertion failed: {message}")]
    Failed { message: String },

    #[error("{} soft assertion(s) failed: {}", failures.len(), failures.join("; "))]
    Soft { failures: Vec<String> },

    #[error(
        "Critical validation gap detected: API accepted invalid order data for '{case}'. \
         Expected 4xx status but got {status}. This indicates missing API validation. Response: {body}"
    )]
    ValidationGap { case: String, status: u16, body: String },
}

impl AssertionError {
    pub fn failed(message: impl Into<String>) -> Self {
        AssertionError::Failed { message: message.into() }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StoreTestError>;

/// Shorthand for returning an assertion failure
pub(crate) fn fail<T>(message: impl Into<String>) -> Result<T> {
    Err(AssertionError::failed(message).into())
}
