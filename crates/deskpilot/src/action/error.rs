//! Action error types.

use thiserror::Error;

use crate::sandbox::SandboxError;

/// Result type for action execution.
pub type ActionResult<T> = Result<T, ActionError>;

/// Why an action did not produce a result.
///
/// None of these end the chat stream; they are reported back as failed action results.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A required parameter is absent (or empty).
    #[error("{field} is required for {action}")]
    MissingField { action: String, field: &'static str },

    /// A parameter is present but unusable.
    #[error("invalid {field} for {action}: {reason}")]
    InvalidField {
        action: String,
        field: &'static str,
        reason: String,
    },

    /// The discriminant names no known action.
    #[error("unsupported action: {0}")]
    Unsupported(String),

    /// The remote desktop call itself failed.
    #[error("sandbox command failed: {0}")]
    Sandbox(#[from] SandboxError),
}

impl ActionError {
    /// Whether the error was detected before any remote call was made.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ActionError::Sandbox(_))
    }
}
