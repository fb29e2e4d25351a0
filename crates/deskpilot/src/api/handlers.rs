//! API request handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    body::Body,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{Instrument, info, info_span, instrument, warn};

use deskpilot_protocol::ChatRequest;

use super::encoding::WireProtocol;
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::action::ActionExecutor;
use crate::dispatch::{Dispatcher, build_messages};
use crate::inference::{CompletionRequest, InferenceError, InferenceResult, TokenStream};
use crate::sandbox::{SandboxError, validate_sandbox_id};

/// Buffered events between the dispatcher and the response body.
const EVENT_BUFFER: usize = 64;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub protocol: WireProtocol,
}

/// Stream a chat turn.
///
/// Everything that can fail before the first byte (bad body, unknown sandbox,
/// unreachable model, a model that errors before its first chunk) is answered with a
/// JSON error. Once streaming starts, failures arrive as events.
pub async fn chat(
    State(state): State<AppState>,
    query: Result<Query<ChatQuery>, QueryRejection>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let sandbox_id = request.sandbox_id.trim();
    if sandbox_id.is_empty() {
        return Err(ApiError::bad_request("sandboxId is required"));
    }
    validate_sandbox_id(sandbox_id)?;

    let messages = build_messages(
        &request.messages,
        &state.config.desktop,
        &state.config.agent,
    );
    // Only the system prompt left: nothing to answer.
    if messages.len() < 2 {
        return Err(ApiError::bad_request("messages must contain at least one non-empty message"));
    }

    let desktop = match state.sandboxes.connect(sandbox_id).await {
        Ok(desktop) => desktop,
        Err(SandboxError::NotFound(id)) => {
            return Err(ApiError::not_found(format!("sandbox {id}")));
        }
        Err(e) => {
            if let Err(kill_err) = state.sandboxes.kill(sandbox_id).await {
                warn!(sandbox_id, "failed to terminate sandbox: {}", kill_err);
            }
            return Err(e.into());
        }
    };

    info!(
        sandbox_id,
        model = state.inference.model(),
        messages = messages.len(),
        protocol = ?query.protocol,
        "starting chat stream"
    );

    let max_duration = Duration::from_secs(state.config.agent.max_request_duration_secs);
    let started = Instant::now();
    let tokens = match open_stream(&state, CompletionRequest { messages }, max_duration).await {
        Ok(tokens) => tokens,
        Err(e) => {
            if let Err(kill_err) = desktop.kill().await {
                warn!(sandbox_id, "failed to terminate sandbox: {}", kill_err);
            }
            return Err(e.into());
        }
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let dispatcher = Dispatcher::new(
        ActionExecutor::new(desktop),
        tx,
        max_duration.saturating_sub(started.elapsed()),
    );
    let span = info_span!("chat", sandbox_id = %sandbox_id);
    tokio::spawn(dispatcher.run(tokens).instrument(span));

    let encoder = query.protocol.encoder();
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.content_type());
    for (name, value) in encoder.headers() {
        response = response.header(*name, *value);
    }

    let body = ReceiverStream::new(rx).map(move |event| Ok::<_, Infallible>(encoder.encode(&event)));
    response
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::internal(format!("failed to build stream response: {e}")))
}

/// Open the token stream and wait for its first item, so a model that fails before
/// producing anything is reported as a JSON error instead of a stream.
async fn open_stream(
    state: &AppState,
    request: CompletionRequest,
    max_duration: Duration,
) -> InferenceResult<TokenStream> {
    let mut tokens = state.inference.stream_chat(request).await?;
    let first = tokio::time::timeout(max_duration, tokens.next())
        .await
        .map_err(|_| InferenceError::ConnectTimeout(max_duration.as_secs()))?;
    match first {
        Some(Ok(chunk)) => Ok(Box::pin(tokio_stream::once(Ok(chunk)).chain(tokens))),
        Some(Err(e)) => Err(e),
        None => Ok(tokens),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSandboxResponse {
    pub sandbox_id: String,
}

/// Start a desktop sandbox.
#[instrument(skip(state))]
pub async fn create_sandbox(State(state): State<AppState>) -> ApiResult<Json<CreateSandboxResponse>> {
    let info = state.sandboxes.create().await?;
    Ok(Json(CreateSandboxResponse {
        sandbox_id: info.sandbox_id,
    }))
}

/// Terminate a desktop sandbox. Unknown identifiers succeed.
#[instrument(skip(state))]
pub async fn kill_sandbox(
    State(state): State<AppState>,
    Path(sandbox_id): Path<String>,
) -> ApiResult<StatusCode> {
    validate_sandbox_id(&sandbox_id)?;
    state.sandboxes.kill(&sandbox_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
