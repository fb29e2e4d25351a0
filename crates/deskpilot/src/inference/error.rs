//! Inference client error types.

use thiserror::Error;

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors raised while talking to the inference endpoint.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// HTTP request could not be built or sent.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The endpoint could not be reached.
    #[error("failed to connect to inference endpoint at {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// The endpoint answered with a non-success status.
    #[error("inference endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The endpoint did not open the stream in time.
    #[error("inference endpoint did not respond within {0}s")]
    ConnectTimeout(u64),

    /// The stream broke after it was opened.
    #[error("inference stream failed: {0}")]
    Stream(String),

    /// A stream chunk could not be decoded.
    #[error("failed to parse inference chunk: {0}")]
    ParseError(String),
}
