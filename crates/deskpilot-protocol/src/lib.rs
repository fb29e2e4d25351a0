//! Wire types for deskpilot chat traffic.
//!
//! ```text
//! Browser <--[ChatRequest / encoded StreamEvents]--> deskpilot <--[chat completions]--> VLM
//!                                                        |
//!                                                        +--[desktop commands]--> Sandbox
//! ```
//!
//! The server speaks only these types internally. How a [`StreamEvent`] is laid out on
//! the wire (SSE frames or data-stream lines) is decided by the encoder the client picks.

pub mod actions;
pub mod events;
pub mod messages;

pub use actions::ActionDescriptor;
pub use events::StreamEvent;
pub use messages::{ChatMessage, ChatRequest, Role};
