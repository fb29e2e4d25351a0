//! Test utilities and common setup.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use futures::StreamExt;

use deskpilot::api::{self, AppState};
use deskpilot::config::AppConfig;
use deskpilot::inference::{
    CompletionRequest, InferenceClient, InferenceError, InferenceResult, TokenStream,
};
use deskpilot::sandbox::{
    CommandOutput, Desktop, MouseButton, Point, SandboxError, SandboxInfo, SandboxProvider,
    SandboxResult, ScrollDirection,
};

pub const SANDBOX_ID: &str = "sbx_integration";

/// What the fake model does when asked to stream.
#[derive(Clone)]
pub enum Script {
    /// Stream these chunks, then end.
    Chunks(Vec<String>),
    /// Refuse to open the stream.
    Unreachable,
    /// Open the stream, then break before the first chunk.
    BrokenStream,
}

pub struct ScriptedInference {
    script: Script,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedInference {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::new(Script::Chunks(chunks.iter().map(|c| c.to_string()).collect()))
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn stream_chat(&self, request: CompletionRequest) -> InferenceResult<TokenStream> {
        self.requests.lock().unwrap().push(request);
        match &self.script {
            Script::Chunks(chunks) => {
                let items: Vec<InferenceResult<String>> =
                    chunks.iter().cloned().map(Ok).collect();
                Ok(futures::stream::iter(items).boxed())
            }
            Script::BrokenStream => {
                let items: Vec<InferenceResult<String>> =
                    vec![Err(InferenceError::Stream("connection reset".to_string()))];
                Ok(futures::stream::iter(items).boxed())
            }
            Script::Unreachable => Err(InferenceError::ConnectionFailed {
                url: "http://model.test/v1/chat/completions".to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }

    fn model(&self) -> &str {
        "test-model"
    }
}

/// Shared log of everything the fake sandbox service was asked to do.
#[derive(Default)]
pub struct SandboxLog {
    pub ops: Mutex<Vec<String>>,
}

impl SandboxLog {
    fn push(&self, op: impl Into<String>) {
        self.ops.lock().unwrap().push(op.into());
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn killed(&self, sandbox_id: &str) -> bool {
        self.ops().contains(&format!("kill {sandbox_id}"))
    }
}

/// Sandbox service with a single known sandbox.
pub struct FakeSandboxes {
    pub log: Arc<SandboxLog>,
}

impl FakeSandboxes {
    pub fn new() -> Self {
        Self {
            log: Arc::new(SandboxLog::default()),
        }
    }
}

#[async_trait]
impl SandboxProvider for FakeSandboxes {
    async fn create(&self) -> SandboxResult<SandboxInfo> {
        self.log.push("create");
        Ok(SandboxInfo {
            sandbox_id: SANDBOX_ID.to_string(),
        })
    }

    async fn connect(&self, sandbox_id: &str) -> SandboxResult<Arc<dyn Desktop>> {
        if sandbox_id != SANDBOX_ID {
            return Err(SandboxError::NotFound(sandbox_id.to_string()));
        }
        Ok(Arc::new(FakeDesktop {
            log: Arc::clone(&self.log),
        }))
    }

    async fn kill(&self, sandbox_id: &str) -> SandboxResult<()> {
        self.log.push(format!("kill {sandbox_id}"));
        Ok(())
    }
}

struct FakeDesktop {
    log: Arc<SandboxLog>,
}

#[async_trait]
impl Desktop for FakeDesktop {
    fn sandbox_id(&self) -> &str {
        SANDBOX_ID
    }

    async fn move_mouse(&self, to: Point) -> SandboxResult<()> {
        self.log.push(format!("move {to}"));
        Ok(())
    }

    async fn click(&self, button: MouseButton, at: Point) -> SandboxResult<()> {
        self.log.push(format!("click {button:?} {at}"));
        Ok(())
    }

    async fn double_click(&self, at: Point) -> SandboxResult<()> {
        self.log.push(format!("double_click {at}"));
        Ok(())
    }

    async fn write(&self, text: &str) -> SandboxResult<()> {
        self.log.push(format!("write {text}"));
        Ok(())
    }

    async fn press(&self, key: &str) -> SandboxResult<()> {
        self.log.push(format!("press {key}"));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> SandboxResult<()> {
        self.log.push(format!("scroll {} {amount}", direction.as_str()));
        Ok(())
    }

    async fn drag(&self, from: Point, to: Point) -> SandboxResult<()> {
        self.log.push(format!("drag {from} {to}"));
        Ok(())
    }

    async fn run_command(&self, command: &str) -> SandboxResult<CommandOutput> {
        self.log.push(format!("run {command}"));
        Ok(CommandOutput {
            stdout: "file.txt\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn screenshot(&self) -> SandboxResult<Vec<u8>> {
        self.log.push("screenshot");
        Ok(b"png".to_vec())
    }

    async fn kill(&self) -> SandboxResult<()> {
        self.log.push(format!("kill {SANDBOX_ID}"));
        Ok(())
    }
}

/// Router wired to the given fakes, plus handles to inspect them.
pub struct TestApp {
    pub router: Router,
    pub inference: Arc<ScriptedInference>,
    pub sandbox_log: Arc<SandboxLog>,
}

pub fn test_app(inference: ScriptedInference) -> TestApp {
    let inference = Arc::new(inference);
    let sandboxes = FakeSandboxes::new();
    let sandbox_log = Arc::clone(&sandboxes.log);

    let state = AppState::new(
        inference.clone(),
        Arc::new(sandboxes),
        AppConfig::default(),
    );

    TestApp {
        router: api::create_router(state),
        inference,
        sandbox_log,
    }
}
