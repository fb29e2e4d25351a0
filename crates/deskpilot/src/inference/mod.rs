//! Inference endpoint access.
//!
//! The dispatch loop only sees the [`InferenceClient`] trait: hand it the prompt, get
//! back a stream of text chunks. [`OpenAiCompatClient`] is the production
//! implementation for OpenAI-compatible streaming chat completion APIs.

mod client;
mod error;
mod types;

pub use client::{OpenAiCompatClient, OpenAiCompatConfig};
pub use error::{InferenceError, InferenceResult};
pub use types::{ChatCompletionChunk, ChatCompletionRequest};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use deskpilot_protocol::ChatMessage;

/// Incremental model output. Ends when the model is done; an `Err` item is final.
pub type TokenStream = Pin<Box<dyn Stream<Item = InferenceResult<String>> + Send>>;

/// A fully assembled prompt: system message first, then the pruned history.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

/// Streaming access to a hosted model.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Open a token stream for `request`.
    ///
    /// Returns only once the endpoint has accepted the stream, so connection and
    /// status failures surface here rather than as the first stream item.
    async fn stream_chat(&self, request: CompletionRequest) -> InferenceResult<TokenStream>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}
