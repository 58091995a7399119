// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! JSON wire format for calls and returns.
//!
//! Key spelling on the wire is fixed: `name` and `args` are lowercase,
//! `CallId` and `ResponseQueueUrl` are capitalized. The trampoline depends
//! on these exact keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// SQS message attribute carrying the call id on queue-mode replies.
pub const CALL_ID_ATTRIBUTE: &str = "CallId";

/// Message attribute identifying a stop sentinel.
pub const STOP_ATTRIBUTE: &str = "cloudify";

/// Attribute value of a stop sentinel.
pub const STOP_VALUE: &str = "stop";

/// Body of a stop sentinel message. The body is never inspected; SQS just
/// refuses to send an empty one.
pub const STOP_BODY: &str = "empty";

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload was not valid JSON for the expected message shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Generate a fresh 128-bit call id.
///
/// Call ids are opaque; the only requirement is that concurrent calls on one
/// instance never collide.
pub fn new_call_id() -> String {
    Uuid::new_v4().to_string()
}

/// One invocation request as shipped to the cloud function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the target function inside the registered module.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Correlation id, fresh per call.
    #[serde(rename = "CallId")]
    pub call_id: String,
    /// Reply queue for queue-mode calls; absent in direct mode.
    #[serde(
        rename = "ResponseQueueUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_queue_url: Option<String>,
}

impl FunctionCall {
    /// Build a direct-mode call with a fresh call id.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            call_id: new_call_id(),
            response_queue_url: None,
        }
    }

    /// Attach the reply queue, switching the call to queue mode.
    pub fn with_response_queue(mut self, queue_url: impl Into<String>) -> Self {
        self.response_queue_url = Some(queue_url.into());
        self
    }

    /// Encode to the JSON wire form.
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the JSON wire form.
    pub fn decode(payload: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Outcome of one remote invocation as produced by the trampoline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FunctionReturn {
    /// The function returned normally.
    Value {
        /// The returned value, JSON-encoded.
        value: Value,
    },
    /// The function threw.
    Error {
        /// Details of the thrown error.
        value: ErrorDetail,
    },
}

impl FunctionReturn {
    /// Wrap a successful return value.
    pub fn value(value: Value) -> Self {
        FunctionReturn::Value { value }
    }

    /// Wrap a remote error.
    pub fn error(detail: ErrorDetail) -> Self {
        FunctionReturn::Error { value: detail }
    }

    /// Encode to the JSON wire form.
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the JSON wire form.
    pub fn decode(payload: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Error details carried by a `FunctionReturn` of type `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error message.
    pub message: String,
    /// Error class name (e.g. `TypeError`).
    pub name: String,
    /// Stack trace, when the remote runtime captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorDetail {
    /// Build an error detail without a stack trace.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: name.into(),
            stack: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_id_is_unique() {
        let a = new_call_id();
        let b = new_call_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_call_id_is_uuid_shaped() {
        let id = new_call_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }

    #[test]
    fn test_function_call_wire_keys() {
        let call = FunctionCall::new("add", vec![json!(2), json!(3)]);
        let encoded = call.encode().unwrap();
        let raw: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(raw["name"], "add");
        assert_eq!(raw["args"], json!([2, 3]));
        assert!(raw["CallId"].is_string());
        // Direct-mode calls must not carry a reply queue.
        assert!(raw.get("ResponseQueueUrl").is_none());
    }

    #[test]
    fn test_function_call_with_response_queue() {
        let call = FunctionCall::new("add", vec![]).with_response_queue("https://sqs/q");
        let encoded = call.encode().unwrap();
        let raw: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(raw["ResponseQueueUrl"], "https://sqs/q");
    }

    #[test]
    fn test_function_return_value_tag() {
        let ret = FunctionReturn::value(json!(5));
        let encoded = ret.encode().unwrap();
        let raw: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(raw["type"], "value");
        assert_eq!(raw["value"], 5);
    }

    #[test]
    fn test_function_return_error_tag() {
        let ret = FunctionReturn::error(ErrorDetail::new("TypeError", "x"));
        let encoded = ret.encode().unwrap();
        let raw: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(raw["type"], "error");
        assert_eq!(raw["value"]["name"], "TypeError");
        assert_eq!(raw["value"]["message"], "x");
        assert!(raw["value"].get("stack").is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(FunctionReturn::decode("not json").is_err());
        assert!(FunctionCall::decode("{}").is_err());
    }
}
