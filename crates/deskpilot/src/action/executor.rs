//! Action execution against a live desktop.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, instrument};

use deskpilot_protocol::ActionDescriptor;

use super::error::ActionResult;
use super::{Action, sandbox_key_name};
use crate::sandbox::{CommandOutput, Desktop, MouseButton};

/// What an action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput {
    /// Confirmation or captured command output.
    Text(String),
    /// Encoded raster as a `data:` URL.
    Image { data_url: String },
}

/// Runs validated actions against one sandbox desktop.
#[derive(Clone)]
pub struct ActionExecutor {
    desktop: Arc<dyn Desktop>,
}

impl ActionExecutor {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }

    pub fn desktop(&self) -> &Arc<dyn Desktop> {
        &self.desktop
    }

    /// Validate and run one descriptor.
    ///
    /// Validation failures return before any remote call. A supported, valid
    /// descriptor results in exactly one desktop call (none for `wait`).
    #[instrument(skip_all, fields(sandbox_id = %self.desktop.sandbox_id(), action = %descriptor.action))]
    pub async fn execute(&self, descriptor: &ActionDescriptor) -> ActionResult<ActionOutput> {
        let action = Action::from_descriptor(descriptor)?;
        debug!(?action, "executing action");
        self.run(action).await
    }

    async fn run(&self, action: Action) -> ActionResult<ActionOutput> {
        let desktop = self.desktop.as_ref();
        let text = match action {
            Action::Screenshot => {
                let png = desktop.screenshot().await?;
                return Ok(ActionOutput::Image {
                    data_url: png_data_url(&png),
                });
            }
            Action::Wait { seconds } => {
                tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                format!("Waited for {seconds} seconds")
            }
            Action::LeftClick { at } => {
                desktop.click(MouseButton::Left, at).await?;
                format!("Left clicked at {at}")
            }
            Action::DoubleClick { at } => {
                desktop.double_click(at).await?;
                format!("Double clicked at {at}")
            }
            Action::RightClick { at } => {
                desktop.click(MouseButton::Right, at).await?;
                format!("Right clicked at {at}")
            }
            Action::MouseMove { to } => {
                desktop.move_mouse(to).await?;
                format!("Moved mouse to {to}")
            }
            Action::Type { text } => {
                desktop.write(&text).await?;
                format!("Typed: {text}")
            }
            Action::Key { key } => {
                desktop.press(sandbox_key_name(&key)).await?;
                format!("Pressed key: {key}")
            }
            Action::Scroll { direction, amount } => {
                desktop.scroll(direction, amount).await?;
                format!("Scrolled {} {} units", direction.as_str(), amount)
            }
            Action::LeftClickDrag { from, to } => {
                desktop.drag(from, to).await?;
                format!(
                    "Dragged from {},{} to {},{}",
                    from.x, from.y, to.x, to.y
                )
            }
            Action::Bash { command } => {
                let output = desktop.run_command(&command).await?;
                format_command_output(&output)
            }
        };
        Ok(ActionOutput::Text(text))
    }
}

fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Render captured command output for the model and the client.
pub(crate) fn format_command_output(output: &CommandOutput) -> String {
    let stdout = output.stdout.trim_end();
    let stderr = output.stderr.trim_end();

    let mut text = String::new();
    if !stdout.is_empty() {
        text.push_str(stdout);
    }
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("[stderr]\n");
        text.push_str(stderr);
    }
    if output.exit_code != 0 {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&format!("[exit status {}]", output.exit_code));
    }
    if text.is_empty() {
        text.push_str("(Command executed successfully with no output)");
    }
    text
}
