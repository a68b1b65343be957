use cebridge_relay::failure_value;
use serde_json::{json, Value};

/// Render a successful call result as structured text.
///
/// Objects are emitted unchanged as compact JSON. Anything else is wrapped
/// as `{"success": true, "result": <value>}`.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Object(_) => value.to_string(),
        other => json!({ "success": true, "result": other }).to_string(),
    }
}

/// Render any failure as `{"success": false, "error": "<message>"}`.
pub fn format_failure(message: impl std::fmt::Display) -> String {
    failure_value(&message.to_string()).to_string()
}

/// Whether formatted text reports a failure.
pub fn is_failure(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .map(|value| value.get("success") == Some(&Value::Bool(false)))
        .unwrap_or(false)
}
