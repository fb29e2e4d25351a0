//! Streaming dispatch: turning model output into desktop actions.
//!
//! ```text
//! TokenStream ──chunks──▶ ActionScanner ──Text──────────────▶ TextDelta
//!                                       └─Action─▶ ActionExecutor ─▶ ActionStarted + result
//! ```
//!
//! [`Dispatcher`] runs one request end to end and pushes [`StreamEvent`]s into a channel
//! that the HTTP layer encodes for the client.
//!
//! [`StreamEvent`]: deskpilot_protocol::StreamEvent

mod prompt;
mod runner;
mod scanner;

pub use prompt::{build_messages, prune_history, system_prompt};
pub use runner::{DispatchOutcome, Dispatcher, UPSTREAM_ERROR_MESSAGE};
pub use scanner::{ActionScanner, Segment};
