//! In-crate test doubles.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::sandbox::{
    CommandOutput, Desktop, MouseButton, Point, SandboxError, SandboxResult, ScrollDirection,
};

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopCall {
    MoveMouse(Point),
    Click(MouseButton, Point),
    DoubleClick(Point),
    Write(String),
    Press(String),
    Scroll(ScrollDirection, u32),
    Drag(Point, Point),
    RunCommand(String),
    Screenshot,
    Kill,
}

/// Desktop that records every call and answers from canned values.
pub struct RecordingDesktop {
    calls: Mutex<Vec<DesktopCall>>,
    screenshot: Vec<u8>,
    command_output: CommandOutput,
    failure: Option<String>,
}

impl RecordingDesktop {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            screenshot: b"\x89PNG".to_vec(),
            command_output: CommandOutput::default(),
            failure: None,
        }
    }

    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = png;
        self
    }

    pub fn with_command_output(mut self, output: CommandOutput) -> Self {
        self.command_output = output;
        self
    }

    /// Every desktop operation except `kill` fails with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<DesktopCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn killed(&self) -> bool {
        self.calls().contains(&DesktopCall::Kill)
    }

    fn record(&self, call: DesktopCall) -> SandboxResult<()> {
        let is_kill = call == DesktopCall::Kill;
        self.calls.lock().unwrap().push(call);
        match &self.failure {
            Some(message) if !is_kill => Err(SandboxError::ConnectionFailed {
                url: "http://sandbox.test".to_string(),
                message: message.clone(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Desktop for RecordingDesktop {
    fn sandbox_id(&self) -> &str {
        "sbx_test"
    }

    async fn move_mouse(&self, to: Point) -> SandboxResult<()> {
        self.record(DesktopCall::MoveMouse(to))
    }

    async fn click(&self, button: MouseButton, at: Point) -> SandboxResult<()> {
        self.record(DesktopCall::Click(button, at))
    }

    async fn double_click(&self, at: Point) -> SandboxResult<()> {
        self.record(DesktopCall::DoubleClick(at))
    }

    async fn write(&self, text: &str) -> SandboxResult<()> {
        self.record(DesktopCall::Write(text.to_string()))
    }

    async fn press(&self, key: &str) -> SandboxResult<()> {
        self.record(DesktopCall::Press(key.to_string()))
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> SandboxResult<()> {
        self.record(DesktopCall::Scroll(direction, amount))
    }

    async fn drag(&self, from: Point, to: Point) -> SandboxResult<()> {
        self.record(DesktopCall::Drag(from, to))
    }

    async fn run_command(&self, command: &str) -> SandboxResult<CommandOutput> {
        self.record(DesktopCall::RunCommand(command.to_string()))?;
        Ok(self.command_output.clone())
    }

    async fn screenshot(&self) -> SandboxResult<Vec<u8>> {
        self.record(DesktopCall::Screenshot)?;
        Ok(self.screenshot.clone())
    }

    async fn kill(&self) -> SandboxResult<()> {
        self.record(DesktopCall::Kill)
    }
}
