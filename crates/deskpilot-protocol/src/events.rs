//! Stream events.
//!
//! One chat request produces a sequence of events that ends with exactly one of
//! [`StreamEvent::Done`] or [`StreamEvent::Error`]. Events are delivered in the order
//! they were produced and are never retracted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single event in a chat response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Plain model text, forwarded as soon as it is known not to belong to an action.
    TextDelta { content: String },

    /// A complete action descriptor was recognized and is about to run.
    ActionStarted {
        call_id: String,
        action: String,
        /// The full descriptor, discriminant included.
        details: Value,
    },

    /// Textual outcome of an action. Validation and sandbox failures arrive here with
    /// `is_error` set; the stream keeps going.
    ActionResult {
        call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },

    /// Image outcome of an action (a `data:` URL).
    ImageResult { call_id: String, data: String },

    /// Unrecoverable failure. Nothing follows it.
    Error { message: String },

    /// The model finished. Nothing follows it.
    Done,
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        Self::TextDelta {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization_tags() {
        let json = serde_json::to_value(StreamEvent::ActionStarted {
            call_id: "call_1".to_string(),
            action: "screenshot".to_string(),
            details: json!({"action": "screenshot"}),
        })
        .unwrap();
        assert_eq!(json["type"], "action_started");
        assert_eq!(json["call_id"], "call_1");

        let json = serde_json::to_value(StreamEvent::Done).unwrap();
        assert_eq!(json, json!({"type": "done"}));
    }
}
