//! Incremental detection of action objects in model text.
//!
//! The model mixes prose with JSON objects like `{"action": "screenshot"}`. The scanner
//! is fed chunks as they arrive and splits them into plain text and complete
//! [`ActionDescriptor`]s:
//!
//! - Text is released as soon as it cannot be part of an object.
//! - From an opening `{` whose first non-blank character is `"`, characters are held
//!   and braces are counted (string literals and escapes respected) until the object
//!   balances. A further `{` before any `"action"` key has been seen releases the held
//!   text and starts over from the new brace.
//! - A balanced object that parses and carries a string `action` key becomes an
//!   [`Segment::Action`]. A balanced object that mentions `"action"` but does not parse
//!   as a descriptor is dropped. Anything else was just prose and is released as text.
//!
//! Decisions are made one character at a time, so the output does not depend on how
//! the stream was chunked (only the grouping of text into segments does).

use serde_json::Value;
use tracing::warn;

use deskpilot_protocol::ActionDescriptor;
use deskpilot_protocol::actions::ACTION_KEY;

/// Held objects larger than this are given up on.
const MAX_CANDIDATE_BYTES: usize = 64 * 1024;

/// A piece of scanner output, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Action(ActionDescriptor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Forwarding prose.
    Text,
    /// Saw `{`, waiting for the first non-blank character.
    Opening,
    /// Inside an object body.
    Object,
    /// Skipping the rest of an oversized descriptor.
    Discarding,
}

/// Splits a chunked character stream into text and action descriptors.
#[derive(Debug)]
pub struct ActionScanner {
    phase: Phase,
    /// Held characters, starting at the opening brace.
    candidate: String,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Default for ActionScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionScanner {
    pub fn new() -> Self {
        Self {
            phase: Phase::Text,
            candidate: String::new(),
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Whether characters are currently being held back as a possible action.
    pub fn is_accumulating(&self) -> bool {
        self.phase != Phase::Text
    }

    /// Consume one chunk.
    pub fn feed(&mut self, chunk: &str) -> Vec<Segment> {
        let mut out = Output::default();
        for c in chunk.chars() {
            self.push_char(c, &mut out);
        }
        out.finish()
    }

    /// Flush at end of stream. A held object that looks like an action is discarded;
    /// any other held text is released.
    pub fn finish(&mut self) -> Vec<Segment> {
        let mut out = Output::default();
        if self.phase == Phase::Discarding {
            self.take_candidate();
        } else if self.is_accumulating() {
            let held = self.take_candidate();
            if mentions_action_key(&held) {
                warn!(
                    len = held.len(),
                    "discarding incomplete action descriptor at end of stream"
                );
            } else {
                out.text(&held);
            }
        }
        out.finish()
    }

    fn push_char(&mut self, c: char, out: &mut Output) {
        match self.phase {
            Phase::Text => {
                if c == '{' {
                    self.begin_candidate();
                } else {
                    out.text_char(c);
                }
            }
            Phase::Opening => match c {
                '"' => {
                    self.candidate.push(c);
                    self.phase = Phase::Object;
                    self.in_string = true;
                }
                c if c.is_whitespace() => self.candidate.push(c),
                '{' => {
                    // The earlier brace was prose; this one may start an object.
                    let held = self.take_candidate();
                    out.text(&held);
                    self.begin_candidate();
                }
                _ => {
                    let held = self.take_candidate();
                    out.text(&held);
                    out.text_char(c);
                }
            },
            Phase::Object => {
                if c == '{' && !mentions_action_key(&self.candidate) {
                    // No action key yet: the held text was prose.
                    let held = self.take_candidate();
                    out.text(&held);
                    self.begin_candidate();
                    return;
                }
                self.candidate.push(c);
                if self.track(c) {
                    let held = self.take_candidate();
                    resolve_object(held, out);
                    return;
                }
                if self.candidate.len() > MAX_CANDIDATE_BYTES {
                    if mentions_action_key(&self.candidate) {
                        warn!(
                            len = self.candidate.len(),
                            "discarding oversized action descriptor"
                        );
                        self.candidate.clear();
                        self.phase = Phase::Discarding;
                    } else {
                        let held = self.take_candidate();
                        out.text(&held);
                    }
                }
            }
            Phase::Discarding => {
                if self.track(c) {
                    self.take_candidate();
                }
            }
        }
    }

    /// Update string and brace state for one object character. Returns true when the
    /// object balances.
    fn track(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return false;
        }
        match c {
            '"' => self.in_string = true,
            '{' => self.depth += 1,
            '}' => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }

    fn begin_candidate(&mut self) {
        self.candidate.clear();
        self.candidate.push('{');
        self.phase = Phase::Opening;
        self.depth = 1;
        self.in_string = false;
        self.escaped = false;
    }

    fn take_candidate(&mut self) -> String {
        self.phase = Phase::Text;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        std::mem::take(&mut self.candidate)
    }
}

/// Decide what a balanced object was.
fn resolve_object(object: String, out: &mut Output) {
    match serde_json::from_str::<Value>(&object) {
        Ok(Value::Object(map)) if map.contains_key(ACTION_KEY) => {
            match serde_json::from_value::<ActionDescriptor>(Value::Object(map)) {
                Ok(descriptor) => out.action(descriptor),
                Err(e) => warn!("discarding malformed action descriptor: {}", e),
            }
        }
        Ok(_) => out.text(&object),
        Err(e) if mentions_action_key(&object) => {
            warn!("discarding unparseable action descriptor: {}", e);
        }
        Err(_) => out.text(&object),
    }
}

fn mentions_action_key(text: &str) -> bool {
    text.contains("\"action\"")
}

/// Collects segments, merging adjacent text.
#[derive(Default)]
struct Output {
    segments: Vec<Segment>,
    text: String,
}

impl Output {
    fn text_char(&mut self, c: char) {
        self.text.push(c);
    }

    fn text(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn action(&mut self, descriptor: ActionDescriptor) {
        self.flush_text();
        self.segments.push(Segment::Action(descriptor));
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.segments
                .push(Segment::Text(std::mem::take(&mut self.text)));
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        self.flush_text();
        self.segments
    }
}
