//! HTTP API module.
//!
//! Provides the chat streaming endpoint and the sandbox start/stop helpers.

mod encoding;
mod error;
mod handlers;
mod routes;
mod state;

pub use encoding::{DataStreamEncoder, EventEncoder, SseEncoder, WireProtocol};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
