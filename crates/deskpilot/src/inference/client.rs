//! OpenAI-compatible streaming client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event as SseEvent, EventSource, retry::Never};
use tracing::{debug, warn};

use super::error::{InferenceError, InferenceResult};
use super::types::{ApiErrorBody, ChatCompletionChunk, ChatCompletionRequest};
use super::{CompletionRequest, InferenceClient, TokenStream};

/// Sentinel payload closing an OpenAI-style stream.
const DONE_MARKER: &str = "[DONE]";

/// Settings for [`OpenAiCompatClient`].
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Base URL including the API version segment (e.g. "https://api.together.xyz/v1").
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub connect_timeout: Duration,
}

/// Client for any endpoint speaking the OpenAI chat completions streaming protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiCompatConfig) -> InferenceResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl InferenceClient for OpenAiCompatClient {
    async fn stream_chat(&self, request: CompletionRequest) -> InferenceResult<TokenStream> {
        let url = self.completions_url();
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: &request.messages,
            stream: true,
            max_tokens: self.config.max_tokens,
        };
        let request_builder = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("Accept", "text/event-stream")
            .json(&body);

        let mut es = EventSource::new(request_builder)
            .map_err(|e| InferenceError::Stream(format!("cannot build event source: {e}")))?;
        // A chat completion is not idempotent; never silently re-send it.
        es.set_retry_policy(Box::new(Never));

        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            "opening inference stream at {}", url
        );

        let timeout_secs = self.config.connect_timeout.as_secs();
        match tokio::time::timeout(self.config.connect_timeout, es.next()).await {
            Err(_) => {
                es.close();
                return Err(InferenceError::ConnectTimeout(timeout_secs));
            }
            Ok(None) => {
                return Err(InferenceError::Stream(
                    "stream closed before it was opened".to_string(),
                ));
            }
            Ok(Some(Ok(SseEvent::Open))) => {}
            Ok(Some(Ok(SseEvent::Message(msg)))) => {
                // Open always precedes messages; treat anything else as a broken stream.
                es.close();
                return Err(InferenceError::Stream(format!(
                    "unexpected message before open: {}",
                    msg.data
                )));
            }
            Ok(Some(Err(err))) => {
                es.close();
                return Err(open_error(&url, err).await);
            }
        }

        let stream = futures::stream::unfold(Some(es), |state| async move {
            let mut es = state?;
            loop {
                match es.next().await {
                    None => return None,
                    Some(Ok(SseEvent::Open)) => continue,
                    Some(Ok(SseEvent::Message(msg))) => {
                        if msg.data.trim() == DONE_MARKER {
                            es.close();
                            return None;
                        }
                        match serde_json::from_str::<ChatCompletionChunk>(&msg.data) {
                            Ok(chunk) => {
                                if let Some(content) = chunk.content() {
                                    let content = content.to_string();
                                    return Some((Ok(content), Some(es)));
                                }
                            }
                            Err(e) => {
                                es.close();
                                return Some((
                                    Err(InferenceError::ParseError(format!(
                                        "{e}: {}",
                                        msg.data
                                    ))),
                                    None,
                                ));
                            }
                        }
                    }
                    Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                        es.close();
                        return None;
                    }
                    Some(Err(err)) => {
                        warn!("inference stream error: {}", err);
                        es.close();
                        return Some((Err(InferenceError::Stream(err.to_string())), None));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Turn a failure to open the stream into a descriptive error, reading the
/// endpoint's error body when there is one.
async fn open_error(url: &str, err: reqwest_eventsource::Error) -> InferenceError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            InferenceError::Status {
                status: status.as_u16(),
                message,
            }
        }
        reqwest_eventsource::Error::InvalidContentType(content_type, _) => InferenceError::Stream(
            format!("endpoint did not return an event stream (content-type {content_type:?})"),
        ),
        reqwest_eventsource::Error::Transport(e) => InferenceError::ConnectionFailed {
            url: url.to_string(),
            message: e.to_string(),
        },
        other => InferenceError::Stream(other.to_string()),
    }
}
