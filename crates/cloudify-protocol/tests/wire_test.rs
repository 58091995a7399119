// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire-format tests for cloudify-protocol.

use cloudify_protocol::{ErrorDetail, FunctionCall, FunctionReturn};
use serde_json::{Value, json};

#[test]
fn test_function_call_round_trip() {
    let call = FunctionCall::new("concat", vec![json!("a"), json!("b")])
        .with_response_queue("https://sqs.us-west-2.amazonaws.com/1/q-Responses");

    let decoded = FunctionCall::decode(&call.encode().unwrap()).unwrap();
    assert_eq!(decoded, call);
}

#[test]
fn test_function_return_round_trip() {
    let ret = FunctionReturn::value(json!({"nested": [1, 2, 3]}));
    let decoded = FunctionReturn::decode(&ret.encode().unwrap()).unwrap();
    assert_eq!(decoded, ret);
}

#[test]
fn test_error_return_round_trip_with_stack() {
    let ret = FunctionReturn::error(ErrorDetail {
        message: "x".to_string(),
        name: "TypeError".to_string(),
        stack: Some("TypeError: x\n    at boom".to_string()),
    });

    let decoded = FunctionReturn::decode(&ret.encode().unwrap()).unwrap();
    assert_eq!(decoded, ret);
}

#[test]
fn test_decode_trampoline_shaped_reply() {
    // The exact JSON a trampoline produces for a successful call.
    let payload = r#"{"type":"value","value":5}"#;
    let ret = FunctionReturn::decode(payload).unwrap();
    assert_eq!(ret, FunctionReturn::value(json!(5)));
}

#[test]
fn test_decode_trampoline_shaped_error() {
    let payload = r#"{"type":"error","value":{"message":"x","name":"TypeError","stack":"TypeError: x"}}"#;
    match FunctionReturn::decode(payload).unwrap() {
        FunctionReturn::Error { value } => {
            assert_eq!(value.name, "TypeError");
            assert_eq!(value.message, "x");
            assert_eq!(value.stack.as_deref(), Some("TypeError: x"));
        }
        other => panic!("expected error return, got {:?}", other),
    }
}

#[test]
fn test_decode_call_without_reply_queue() {
    let payload = r#"{"name":"add","args":[2,3],"CallId":"abc"}"#;
    let call = FunctionCall::decode(payload).unwrap();
    assert_eq!(call.name, "add");
    assert_eq!(call.call_id, "abc");
    assert!(call.response_queue_url.is_none());
}

#[test]
fn test_null_value_survives() {
    let ret = FunctionReturn::value(Value::Null);
    let decoded = FunctionReturn::decode(&ret.encode().unwrap()).unwrap();
    assert_eq!(decoded, FunctionReturn::value(Value::Null));
}
