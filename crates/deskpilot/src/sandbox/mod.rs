//! Remote desktop sandbox access.
//!
//! A sandbox is a virtual desktop living in a remote service. The chat path resolves a
//! sandbox identifier to a [`Desktop`] through a [`SandboxProvider`] and then issues one
//! command per model action:
//!
//! ```text
//! ┌──────────────┐   connect(id)   ┌─────────────────┐   HTTP   ┌──────────────┐
//! │ dispatch loop│ ───────────────▶│ SandboxProvider │ ────────▶│ sandbox API  │
//! │              │   Desktop ops   │   └─ Desktop    │          │ (virtual X11)│
//! └──────────────┘ ───────────────▶└─────────────────┘          └──────────────┘
//! ```

mod client;
mod error;

pub use client::{HttpSandboxConfig, HttpSandboxProvider};
pub use error::{SandboxError, SandboxResult};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Longest identifier accepted by [`validate_sandbox_id`].
const MAX_SANDBOX_ID_LEN: usize = 128;

/// Check that a client-supplied identifier is a single safe path segment.
pub fn validate_sandbox_id(sandbox_id: &str) -> SandboxResult<()> {
    if sandbox_id.is_empty() {
        return Err(SandboxError::InvalidId("sandbox id cannot be empty".to_string()));
    }
    if sandbox_id.len() > MAX_SANDBOX_ID_LEN {
        return Err(SandboxError::InvalidId(
            "sandbox id exceeds maximum length".to_string(),
        ));
    }
    let valid_chars = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !sandbox_id.chars().all(valid_chars) {
        return Err(SandboxError::InvalidId(format!(
            "'{sandbox_id}' contains invalid characters"
        )));
    }
    Ok(())
}

/// Absolute pixel position on the desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        }
    }
}

/// Captured result of a shell command run inside the sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: i32,
}

/// A freshly started sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxInfo {
    pub sandbox_id: String,
}

/// Operations on one live remote desktop.
///
/// Every method is a single remote call. Everything except `screenshot` changes
/// remote state irreversibly.
#[async_trait]
pub trait Desktop: Send + Sync {
    /// Identifier of the sandbox backing this desktop.
    fn sandbox_id(&self) -> &str;

    async fn move_mouse(&self, to: Point) -> SandboxResult<()>;

    /// Move the pointer to `at`, then click `button` once.
    async fn click(&self, button: MouseButton, at: Point) -> SandboxResult<()>;

    /// Move the pointer to `at`, then double click the left button.
    async fn double_click(&self, at: Point) -> SandboxResult<()>;

    /// Type literal text.
    async fn write(&self, text: &str) -> SandboxResult<()>;

    /// Press a named key (e.g. "enter", "Tab").
    async fn press(&self, key: &str) -> SandboxResult<()>;

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> SandboxResult<()>;

    /// Press at `from`, drag to `to`, release.
    async fn drag(&self, from: Point, to: Point) -> SandboxResult<()>;

    /// Run a shell command. A non-zero exit status is reported in the output, not as
    /// an error.
    async fn run_command(&self, command: &str) -> SandboxResult<CommandOutput>;

    /// Capture the current frame as PNG bytes.
    async fn screenshot(&self) -> SandboxResult<Vec<u8>>;

    /// Terminate the sandbox.
    async fn kill(&self) -> SandboxResult<()>;
}

/// Resolves sandbox identifiers to desktops and manages their start/stop.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Start a new desktop sandbox.
    async fn create(&self) -> SandboxResult<SandboxInfo>;

    /// Attach to a running sandbox.
    async fn connect(&self, sandbox_id: &str) -> SandboxResult<Arc<dyn Desktop>>;

    /// Terminate a sandbox. Unknown identifiers are not an error.
    async fn kill(&self, sandbox_id: &str) -> SandboxResult<()>;
}
