//! Wire encodings for the chat response stream.
//!
//! Two encodings of the same [`StreamEvent`] sequence are offered, selected with
//! `?protocol=`:
//!
//! - `sse` (default): `data: {json}\n\n` frames closed by `data: [DONE]`.
//! - `data-stream`: one `<code>:<json>\n` line per event, as consumed by AI SDK style
//!   clients.

use serde::Deserialize;
use serde_json::{Value, json};

use deskpilot_protocol::StreamEvent;

/// Tool name reported for every action in the data-stream encoding.
pub const TOOL_NAME: &str = "computer";

/// Selected response encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireProtocol {
    #[default]
    Sse,
    DataStream,
}

impl WireProtocol {
    pub fn encoder(self) -> Box<dyn EventEncoder> {
        match self {
            WireProtocol::Sse => Box::new(SseEncoder),
            WireProtocol::DataStream => Box::new(DataStreamEncoder),
        }
    }
}

/// Serializes stream events into response body frames.
pub trait EventEncoder: Send + Sync {
    fn content_type(&self) -> &'static str;

    /// Extra response headers beyond the content type.
    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// One complete frame, terminator included.
    fn encode(&self, event: &StreamEvent) -> String;
}

pub struct SseEncoder;

impl EventEncoder for SseEncoder {
    fn content_type(&self) -> &'static str {
        "text/event-stream"
    }

    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("Cache-Control", "no-cache"),
            ("Connection", "keep-alive"),
            ("X-Accel-Buffering", "no"),
        ]
    }

    fn encode(&self, event: &StreamEvent) -> String {
        let payload = match event {
            StreamEvent::TextDelta { content } => json!({"type": "text", "content": content}),
            StreamEvent::ActionStarted {
                action, details, ..
            } => json!({"type": "action_start", "action": action, "details": details}),
            StreamEvent::ActionResult {
                content, is_error, ..
            } => {
                if *is_error {
                    json!({"type": "action_result", "content": content, "is_error": true})
                } else {
                    json!({"type": "action_result", "content": content})
                }
            }
            StreamEvent::ImageResult { data, .. } => json!({"type": "image", "data": data}),
            StreamEvent::Error { message } => json!({"type": "error", "content": message}),
            StreamEvent::Done => return "data: [DONE]\n\n".to_string(),
        };
        format!("data: {payload}\n\n")
    }
}

pub struct DataStreamEncoder;

impl DataStreamEncoder {
    fn line(code: &str, payload: Value) -> String {
        format!("{code}:{payload}\n")
    }

    fn tool_result(call_id: &str, result: Value, is_error: bool) -> String {
        let mut entry = json!({"toolCallId": call_id, "result": result});
        if is_error {
            entry["isError"] = Value::Bool(true);
        }
        Self::line("9", json!([entry]))
    }
}

impl EventEncoder for DataStreamEncoder {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &[("x-vercel-ai-data-stream", "v1"), ("Cache-Control", "no-cache")]
    }

    fn encode(&self, event: &StreamEvent) -> String {
        match event {
            StreamEvent::TextDelta { content } => Self::line("0", json!(content)),
            StreamEvent::ActionStarted {
                call_id, details, ..
            } => Self::line(
                "8",
                json!([{"toolCallId": call_id, "toolName": TOOL_NAME, "args": details}]),
            ),
            StreamEvent::ActionResult {
                call_id,
                content,
                is_error,
            } => Self::tool_result(call_id, json!({"type": "text", "text": content}), *is_error),
            StreamEvent::ImageResult { call_id, data } => {
                Self::tool_result(call_id, json!({"type": "image", "data": data}), false)
            }
            StreamEvent::Error { message } => Self::line("3", json!(message)),
            StreamEvent::Done => Self::line("d", json!({"finishReason": "stop"})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> StreamEvent {
        StreamEvent::ActionStarted {
            call_id: "call_1".to_string(),
            action: "left_click".to_string(),
            details: json!({"action": "left_click", "coordinate": [1, 2]}),
        }
    }

    fn sse_payload(frame: &str) -> Value {
        let body = frame
            .strip_prefix("data: ")
            .and_then(|f| f.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn data_line(line: &str, code: &str) -> Value {
        let body = line
            .strip_prefix(code)
            .and_then(|l| l.strip_prefix(':'))
            .and_then(|l| l.strip_suffix('\n'))
            .unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_protocol_parses_from_query_value() {
        let p: WireProtocol = serde_json::from_value(json!("data-stream")).unwrap();
        assert_eq!(p, WireProtocol::DataStream);
        let p: WireProtocol = serde_json::from_value(json!("sse")).unwrap();
        assert_eq!(p, WireProtocol::Sse);
        assert_eq!(WireProtocol::default(), WireProtocol::Sse);
    }

    #[test]
    fn test_sse_frames() {
        let enc = SseEncoder;
        assert_eq!(
            sse_payload(&enc.encode(&StreamEvent::text("hi \"there\""))),
            json!({"type": "text", "content": "hi \"there\""})
        );
        assert_eq!(
            sse_payload(&enc.encode(&started())),
            json!({"type": "action_start", "action": "left_click", "details": {"action": "left_click", "coordinate": [1, 2]}})
        );
        assert_eq!(
            sse_payload(&enc.encode(&StreamEvent::ImageResult {
                call_id: "call_1".to_string(),
                data: "data:image/png;base64,AA".to_string(),
            })),
            json!({"type": "image", "data": "data:image/png;base64,AA"})
        );
        assert_eq!(
            sse_payload(&enc.encode(&StreamEvent::error("boom"))),
            json!({"type": "error", "content": "boom"})
        );
        assert_eq!(enc.encode(&StreamEvent::Done), "data: [DONE]\n\n");
    }

    #[test]
    fn test_sse_error_flag_only_on_failure() {
        let enc = SseEncoder;
        let ok = enc.encode(&StreamEvent::ActionResult {
            call_id: "c".to_string(),
            content: "Typed: x".to_string(),
            is_error: false,
        });
        assert_eq!(
            sse_payload(&ok),
            json!({"type": "action_result", "content": "Typed: x"})
        );
        let failed = enc.encode(&StreamEvent::ActionResult {
            call_id: "c".to_string(),
            content: "text is required for type".to_string(),
            is_error: true,
        });
        assert_eq!(
            sse_payload(&failed),
            json!({"type": "action_result", "content": "text is required for type", "is_error": true})
        );
    }

    #[test]
    fn test_data_stream_lines() {
        let enc = DataStreamEncoder;
        assert_eq!(enc.encode(&StreamEvent::text("a\nb")), "0:\"a\\nb\"\n");
        assert_eq!(
            data_line(&enc.encode(&started()), "8"),
            json!([{"toolCallId": "call_1", "toolName": "computer", "args": {"action": "left_click", "coordinate": [1, 2]}}])
        );
        assert_eq!(
            data_line(
                &enc.encode(&StreamEvent::ImageResult {
                    call_id: "call_1".to_string(),
                    data: "data:image/png;base64,AA".to_string(),
                }),
                "9"
            ),
            json!([{"toolCallId": "call_1", "result": {"type": "image", "data": "data:image/png;base64,AA"}}])
        );
        assert_eq!(enc.encode(&StreamEvent::error("boom")), "3:\"boom\"\n");
        assert_eq!(
            data_line(&enc.encode(&StreamEvent::Done), "d"),
            json!({"finishReason": "stop"})
        );
    }

    #[test]
    fn test_data_stream_failed_result_is_flagged() {
        let line = DataStreamEncoder.encode(&StreamEvent::ActionResult {
            call_id: "call_2".to_string(),
            content: "unsupported action: zoom".to_string(),
            is_error: true,
        });
        assert_eq!(
            data_line(&line, "9"),
            json!([{"toolCallId": "call_2", "result": {"type": "text", "text": "unsupported action: zoom"}, "isError": true}])
        );
    }
}
