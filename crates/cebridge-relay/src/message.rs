//! Request and response payloads carried inside envelopes.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON-RPC version tag sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// A method invocation sent to the instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    pub params: Map<String, Value>,
    pub id: u64,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Map<String, Value>, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    /// Serialize to the UTF-8 JSON body of an envelope.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A decoded instrument response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `{"result": ...}`
    Result(Value),
    /// `{"error": ...}`; application data, not a transport fault.
    Error(Value),
    /// Anything else, passed through untouched.
    Raw(Value),
}

impl Reply {
    /// Parse an envelope body.
    pub fn parse(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body).map(Self::from_value)
    }

    /// Classify a parsed response value.
    ///
    /// Any `error` key marks a failure, even `null`, and wins over `result`.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Reply::Raw(value);
        };
        if let Some(error) = map.remove("error") {
            return Reply::Error(error);
        }
        match map.remove("result") {
            Some(result) => Reply::Result(result),
            None => Reply::Raw(Value::Object(map)),
        }
    }

    /// Collapse into the caller-facing value.
    ///
    /// Remote errors become `{"success": false, "error": "<text>"}`.
    pub fn into_value(self) -> Value {
        match self {
            Reply::Result(value) | Reply::Raw(value) => value,
            Reply::Error(error) => failure_value(&error_text(&error)),
        }
    }
}

/// Render an error value as text: strings verbatim, anything else as JSON.
pub fn error_text(error: &Value) -> String {
    match error {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The structured failure shape shared by the client and the tool surface.
pub fn failure_value(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

/// Wall-clock derived request ids, never repeating within one generator.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: u64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds since the epoch, bumped past the previous id if the
    /// clock has not moved (or moved backwards).
    pub fn next_id(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let id = now.max(self.last.saturating_add(1));
        self.last = id;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_wire_shape() {
        let mut params = Map::new();
        params.insert("address".into(), json!("0x1000"));
        params.insert("size".into(), json!(4));
        let body = Request::new("read_memory", params, 42).to_body().unwrap();

        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "method": "read_memory",
                "params": {"address": "0x1000", "size": 4},
                "id": 42
            })
        );
    }

    #[test]
    fn empty_params_serialize_as_object() {
        let body = Request::new("ping", Map::new(), 1).to_body().unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["params"], json!({}));
    }

    #[test]
    fn reply_classification() {
        assert_eq!(
            Reply::parse(br#"{"result":"pong"}"#).unwrap(),
            Reply::Result(json!("pong"))
        );
        assert_eq!(
            Reply::parse(br#"{"error":"not attached"}"#).unwrap(),
            Reply::Error(json!("not attached"))
        );
        assert_eq!(
            Reply::parse(br#"{"error":"x","result":1}"#).unwrap(),
            Reply::Error(json!("x"))
        );
        assert_eq!(
            Reply::parse(br#"{"success":true,"pid":7}"#).unwrap(),
            Reply::Raw(json!({"success": true, "pid": 7}))
        );
        assert_eq!(Reply::parse(b"[1,2]").unwrap(), Reply::Raw(json!([1, 2])));
    }

    #[test]
    fn null_error_still_counts_as_failure() {
        assert_eq!(
            Reply::parse(br#"{"result":5,"error":null}"#).unwrap(),
            Reply::Error(Value::Null)
        );
        assert_eq!(
            Reply::parse(br#"{"error":null}"#).unwrap().into_value(),
            json!({"success": false, "error": "null"})
        );
    }

    #[test]
    fn reply_parse_rejects_garbage() {
        assert!(Reply::parse(b"{not json").is_err());
    }

    #[test]
    fn error_reply_becomes_failure_value() {
        let value = Reply::Error(json!("no process")).into_value();
        assert_eq!(value, json!({"success": false, "error": "no process"}));

        let value = Reply::Error(json!({"code": -32601, "message": "unknown"})).into_value();
        assert_eq!(value["success"], json!(false));
        assert_eq!(
            value["error"],
            json!(r#"{"code":-32601,"message":"unknown"}"#)
        );
    }

    #[test]
    fn request_ids_never_repeat() {
        let mut ids = RequestIds::new();
        let mut previous = ids.next_id();
        for _ in 0..1000 {
            let id = ids.next_id();
            assert!(id > previous);
            previous = id;
        }
    }
}
