//! Sandbox client error types.

use thiserror::Error;

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors that can occur while driving a remote desktop.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The identifier cannot name a sandbox.
    #[error("invalid sandbox id: {0}")]
    InvalidId(String),

    /// The sandbox does not exist (or is no longer running).
    #[error("sandbox not found: {0}")]
    NotFound(String),

    /// The API key was rejected.
    #[error("unauthorized: invalid sandbox API key")]
    Unauthorized,

    /// The sandbox API returned an error response.
    #[error("sandbox API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Connection failed.
    #[error("failed to connect to sandbox API at {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// Failed to parse response.
    #[error("failed to parse sandbox response: {0}")]
    ParseError(String),
}
