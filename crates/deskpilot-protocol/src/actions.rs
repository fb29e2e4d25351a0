//! Action descriptors emitted by the model.
//!
//! The model requests desktop operations by writing a JSON object such as
//! `{"action": "left_click", "coordinate": [100, 200]}` into its text output.
//! A descriptor keeps the discriminant and every other field as raw JSON; checking
//! that the fields make sense for the named action is the executor's job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the discriminant key inside an action object.
pub const ACTION_KEY: &str = "action";

/// A syntactically complete action request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Discriminant naming the requested operation (e.g. `"screenshot"`).
    pub action: String,
    /// Kind-specific parameters, untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ActionDescriptor {
    /// Descriptor with no parameters.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Map::new(),
        }
    }

    /// Add a parameter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a parameter. `null` counts as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// The whole descriptor as a JSON object, as it is echoed back to clients.
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(ACTION_KEY.to_string(), Value::String(self.action.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_extra_fields() {
        let descriptor =
            serde_json::from_str::<ActionDescriptor>(r#"{"action":"left_click","coordinate":[100,200]}"#)
                .unwrap();
        assert_eq!(descriptor.action, "left_click");
        assert_eq!(descriptor.field("coordinate"), Some(&json!([100, 200])));
        assert!(descriptor.field("text").is_none());
    }

    #[test]
    fn test_null_field_counts_as_absent() {
        let descriptor = serde_json::from_str::<ActionDescriptor>(r#"{"action":"type","text":null}"#).unwrap();
        assert!(descriptor.field("text").is_none());
    }

    #[test]
    fn test_missing_or_non_string_action_is_rejected() {
        assert!(serde_json::from_str::<ActionDescriptor>(r#"{"coordinate":[1,2]}"#).is_err());
        assert!(serde_json::from_str::<ActionDescriptor>(r#"{"action":3}"#).is_err());
        assert!(serde_json::from_str::<ActionDescriptor>(r#"["action"]"#).is_err());
    }

    #[test]
    fn test_to_value_includes_discriminant() {
        let descriptor = ActionDescriptor::new("bash").with_field("command", "ls -la");
        assert_eq!(
            descriptor.to_value(),
            json!({"action": "bash", "command": "ls -la"})
        );
    }
}
