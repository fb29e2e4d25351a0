//! Desktop actions requested by the model.
//!
//! [`Action::from_descriptor`] turns a raw [`ActionDescriptor`] into a typed action,
//! checking every required field up front. [`ActionExecutor`] then maps each action onto
//! exactly one [`Desktop`](crate::sandbox::Desktop) call.

mod error;
mod executor;

pub use error::{ActionError, ActionResult};
pub use executor::{ActionExecutor, ActionOutput};

use serde_json::Value;

use deskpilot_protocol::ActionDescriptor;

use crate::sandbox::{Point, ScrollDirection};

/// Upper bound for a `wait` action, in seconds.
pub const MAX_WAIT_SECS: f64 = 2.0;

/// Duration of a `wait` action that does not name one.
pub const DEFAULT_WAIT_SECS: f64 = 1.0;

/// Every action name the executor understands, in the order they are documented to
/// the model.
pub const ACTION_NAMES: [&str; 11] = [
    "screenshot",
    "wait",
    "left_click",
    "double_click",
    "right_click",
    "mouse_move",
    "type",
    "key",
    "scroll",
    "left_click_drag",
    "bash",
];

/// A validated desktop action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Screenshot,
    /// Pure delay, already clamped to `[0, MAX_WAIT_SECS]`.
    Wait { seconds: f64 },
    LeftClick { at: Point },
    DoubleClick { at: Point },
    RightClick { at: Point },
    MouseMove { to: Point },
    Type { text: String },
    /// Key name as the model wrote it.
    Key { key: String },
    Scroll { direction: ScrollDirection, amount: u32 },
    LeftClickDrag { from: Point, to: Point },
    Bash { command: String },
}

impl Action {
    /// Validate a descriptor. No remote call is made here.
    pub fn from_descriptor(descriptor: &ActionDescriptor) -> ActionResult<Self> {
        let fields = Fields { descriptor };
        let action = match descriptor.action.as_str() {
            "screenshot" => Action::Screenshot,
            "wait" => Action::Wait {
                seconds: fields.duration()?,
            },
            "left_click" => Action::LeftClick {
                at: fields.point("coordinate")?,
            },
            "double_click" => Action::DoubleClick {
                at: fields.point("coordinate")?,
            },
            "right_click" => Action::RightClick {
                at: fields.point("coordinate")?,
            },
            "mouse_move" => Action::MouseMove {
                to: fields.point("coordinate")?,
            },
            "type" => Action::Type {
                text: fields.text("text")?,
            },
            "key" => Action::Key {
                key: fields.text("text")?,
            },
            "scroll" => Action::Scroll {
                direction: fields.scroll_direction()?,
                amount: fields.scroll_amount()?,
            },
            "left_click_drag" => Action::LeftClickDrag {
                from: fields.point("start_coordinate")?,
                to: fields.point("coordinate")?,
            },
            "bash" => Action::Bash {
                command: fields.text("command")?,
            },
            other => return Err(ActionError::Unsupported(other.to_string())),
        };
        Ok(action)
    }
}

/// Key name the sandbox expects for a key name written by the model.
pub fn sandbox_key_name(key: &str) -> &str {
    match key {
        "Return" => "enter",
        other => other,
    }
}

/// Field accessors producing field-specific errors.
struct Fields<'a> {
    descriptor: &'a ActionDescriptor,
}

impl Fields<'_> {
    fn missing(&self, field: &'static str) -> ActionError {
        ActionError::MissingField {
            action: self.descriptor.action.clone(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> ActionError {
        ActionError::InvalidField {
            action: self.descriptor.action.clone(),
            field,
            reason: reason.into(),
        }
    }

    fn point(&self, field: &'static str) -> ActionResult<Point> {
        let value = self
            .descriptor
            .field(field)
            .ok_or_else(|| self.missing(field))?;
        let coords = match value.as_array() {
            Some(items) if items.len() == 2 => items,
            _ => return Err(self.invalid(field, "expected [x, y]")),
        };
        let x = pixel(&coords[0]).ok_or_else(|| self.invalid(field, "x is not a number"))?;
        let y = pixel(&coords[1]).ok_or_else(|| self.invalid(field, "y is not a number"))?;
        Ok(Point::new(x, y))
    }

    fn text(&self, field: &'static str) -> ActionResult<String> {
        match self.descriptor.field(field) {
            None => Err(self.missing(field)),
            Some(Value::String(s)) if s.is_empty() => Err(self.missing(field)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(self.invalid(field, "expected a string")),
        }
    }

    fn duration(&self) -> ActionResult<f64> {
        let seconds = match self.descriptor.field("duration") {
            None => DEFAULT_WAIT_SECS,
            Some(value) => value
                .as_f64()
                .filter(|s| s.is_finite())
                .ok_or_else(|| self.invalid("duration", "expected a number of seconds"))?,
        };
        // `+ 0.0` turns -0.0 into 0.0.
        Ok(seconds.clamp(0.0, MAX_WAIT_SECS) + 0.0)
    }

    fn scroll_direction(&self) -> ActionResult<ScrollDirection> {
        match self.text("scroll_direction")?.as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            other => Err(self.invalid(
                "scroll_direction",
                format!("expected \"up\" or \"down\", got {other:?}"),
            )),
        }
    }

    fn scroll_amount(&self) -> ActionResult<u32> {
        let value = self
            .descriptor
            .field("scroll_amount")
            .ok_or_else(|| self.missing("scroll_amount"))?;
        let amount = value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(f64::round)
            .ok_or_else(|| self.invalid("scroll_amount", "expected a number"))?;
        if amount < 1.0 || amount > f64::from(u32::MAX) {
            return Err(self.invalid("scroll_amount", "expected a positive amount"));
        }
        Ok(amount as u32)
    }
}

fn pixel(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .map(|n| n.round() as i64)
}
