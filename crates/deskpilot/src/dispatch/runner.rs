//! The per-request dispatch loop.
//!
//! One [`Dispatcher`] owns everything a chat request needs: the scanner, the executor
//! bound to the request's sandbox, and the sending half of the event channel. It reads
//! the token stream and executes actions inline, one at a time.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deskpilot_protocol::{ActionDescriptor, StreamEvent};

use super::scanner::{ActionScanner, Segment};
use crate::action::{ActionExecutor, ActionOutput};
use crate::inference::{InferenceError, InferenceResult, TokenStream};

/// Message sent to the client when the inference stream breaks.
pub const UPSTREAM_ERROR_MESSAGE: &str = "An error occurred with the AI service. Please try again.";

/// Where the loop is in handling a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Idle,
    StreamingText,
    AccumulatingAction,
    Executing,
    Terminated,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Upstream finished; `done` was emitted.
    Completed,
    /// Upstream broke mid-stream; `error` was emitted and the sandbox terminated.
    UpstreamFailed,
    /// The request ran past its duration ceiling; handled like an upstream failure.
    TimedOut,
    /// The client went away; nothing more was read or executed.
    ClientGone,
}

/// The receiving end of the event channel was dropped.
struct ClientGone;

enum Next {
    Item(Option<InferenceResult<String>>),
    Deadline,
    ClientGone,
}

enum Failure {
    Upstream(InferenceError),
    TimedOut(Duration),
}

pub struct Dispatcher {
    executor: ActionExecutor,
    events: mpsc::Sender<StreamEvent>,
    scanner: ActionScanner,
    state: DispatchState,
    max_duration: Duration,
}

impl Dispatcher {
    pub fn new(
        executor: ActionExecutor,
        events: mpsc::Sender<StreamEvent>,
        max_duration: Duration,
    ) -> Self {
        Self {
            executor,
            events,
            scanner: ActionScanner::new(),
            state: DispatchState::Idle,
            max_duration,
        }
    }

    /// Drive `tokens` to completion, emitting events as they are produced.
    pub async fn run(mut self, mut tokens: TokenStream) -> DispatchOutcome {
        let deadline = Instant::now() + self.max_duration;
        let sandbox_id = self.executor.desktop().sandbox_id().to_string();

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = self.events.closed() => Next::ClientGone,
                _ = tokio::time::sleep_until(deadline) => Next::Deadline,
                item = tokens.next() => Next::Item(item),
            };

            match next {
                Next::Item(Some(Ok(chunk))) => {
                    if self.on_chunk(&chunk).await.is_err() {
                        break DispatchOutcome::ClientGone;
                    }
                }
                Next::Item(Some(Err(e))) => break self.fail(Failure::Upstream(e)).await,
                Next::Item(None) => break self.complete().await,
                Next::Deadline => break self.fail(Failure::TimedOut(self.max_duration)).await,
                Next::ClientGone => break DispatchOutcome::ClientGone,
            }
        };

        match outcome {
            DispatchOutcome::Completed => debug!(%sandbox_id, "chat stream completed"),
            DispatchOutcome::ClientGone => {
                info!(%sandbox_id, state = ?self.state, "client disconnected");
            }
            _ => {}
        }
        self.state = DispatchState::Terminated;
        outcome
    }

    async fn on_chunk(&mut self, chunk: &str) -> Result<(), ClientGone> {
        if self.state == DispatchState::Idle {
            self.state = DispatchState::StreamingText;
        }
        let segments = self.scanner.feed(chunk);
        self.handle_segments(segments).await?;
        self.state = if self.scanner.is_accumulating() {
            DispatchState::AccumulatingAction
        } else {
            DispatchState::StreamingText
        };
        Ok(())
    }

    async fn handle_segments(&mut self, segments: Vec<Segment>) -> Result<(), ClientGone> {
        for segment in segments {
            match segment {
                Segment::Text(text) => self.emit(StreamEvent::text(text)).await?,
                Segment::Action(descriptor) => self.dispatch_action(descriptor).await?,
            }
        }
        Ok(())
    }

    /// Execute one descriptor and report it. Returns only once the action has resolved.
    async fn dispatch_action(&mut self, descriptor: ActionDescriptor) -> Result<(), ClientGone> {
        self.state = DispatchState::Executing;
        let call_id = format!("call_{}", Uuid::new_v4().simple());

        self.emit(StreamEvent::ActionStarted {
            call_id: call_id.clone(),
            action: descriptor.action.clone(),
            details: descriptor.to_value(),
        })
        .await?;

        let event = match self.executor.execute(&descriptor).await {
            Ok(ActionOutput::Text(content)) => StreamEvent::ActionResult {
                call_id,
                content,
                is_error: false,
            },
            Ok(ActionOutput::Image { data_url }) => StreamEvent::ImageResult {
                call_id,
                data: data_url,
            },
            Err(e) => {
                warn!(action = %descriptor.action, "action failed: {}", e);
                StreamEvent::ActionResult {
                    call_id,
                    content: e.to_string(),
                    is_error: true,
                }
            }
        };
        self.emit(event).await
    }

    async fn complete(&mut self) -> DispatchOutcome {
        let tail = self.scanner.finish();
        if self.handle_segments(tail).await.is_err() {
            return DispatchOutcome::ClientGone;
        }
        match self.emit(StreamEvent::Done).await {
            Ok(()) => DispatchOutcome::Completed,
            Err(ClientGone) => DispatchOutcome::ClientGone,
        }
    }

    /// Report a fatal failure and tear the sandbox down.
    async fn fail(&mut self, failure: Failure) -> DispatchOutcome {
        let (message, outcome) = match failure {
            Failure::Upstream(e) => {
                error!(state = ?self.state, "inference stream failed: {}", e);
                (
                    UPSTREAM_ERROR_MESSAGE.to_string(),
                    DispatchOutcome::UpstreamFailed,
                )
            }
            Failure::TimedOut(limit) => {
                error!(
                    limit_secs = limit.as_secs(),
                    state = ?self.state,
                    "chat request exceeded duration limit"
                );
                (
                    format!(
                        "Request exceeded the maximum duration of {} seconds.",
                        limit.as_secs()
                    ),
                    DispatchOutcome::TimedOut,
                )
            }
        };

        // The client may already be gone; the sandbox is torn down either way.
        let _ = self.emit(StreamEvent::error(message)).await;

        let desktop = self.executor.desktop();
        if let Err(e) = desktop.kill().await {
            warn!(sandbox_id = %desktop.sandbox_id(), "failed to terminate sandbox: {}", e);
        }
        outcome
    }

    async fn emit(&self, event: StreamEvent) -> Result<(), ClientGone> {
        self.events.send(event).await.map_err(|_| ClientGone)
    }
}
