// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-call dispatch: direct synchronous invoke or publish-to-topic.
//!
//! Queue-mode ordering matters: the slot MUST be registered before the
//! publish call goes out, because the trampoline can reply before publish
//! returns on the caller side.
//!
//! Direct-mode errors: when Lambda reports a `FunctionError`, the payload
//! is the runtime's error envelope (`errorType` / `errorMessage` / `trace`)
//! and is parsed into the same name/message/stack shape queue-mode replies
//! produce. A payload that is not that envelope is preserved verbatim in
//! the message. Either way the base64 log tail is emitted to the log sink.

use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::LogType;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cloudify_protocol::{FunctionCall, FunctionReturn};
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{ProviderError, Result};
use crate::provider::AwsState;
use crate::types::{Invocation, RawResponse, RemoteError, into_invocation};

/// Invoke synchronously and parse the reply out of the response payload.
pub(crate) async fn invoke_direct(state: &AwsState, call: &FunctionCall) -> Result<Invocation> {
    let payload = call.encode()?;
    debug!(function = %state.resources.function_name, call_id = %call.call_id, "direct invoke");

    let out = state
        .services
        .lambda
        .invoke()
        .function_name(&state.resources.function_name)
        .payload(Blob::new(payload.into_bytes()))
        .log_type(LogType::Tail)
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let function_error = out.function_error().map(str::to_string);
    let log_tail = out.log_result().map(str::to_string);
    let payload = out
        .payload()
        .map(|blob| String::from_utf8_lossy(blob.as_ref()).into_owned())
        .unwrap_or_default();
    let raw = RawResponse::Direct(Box::new(out));

    if let Some(marker) = function_error {
        if let Some(tail) = log_tail {
            emit_log_tail(&state.resources.function_name, &tail);
        }
        return Ok(Invocation {
            value: None,
            error: Some(remote_error_from_payload(marker, payload)),
            raw,
        });
    }

    let ret = FunctionReturn::decode(&payload)?;
    Ok(into_invocation(ret, raw))
}

/// The error envelope the Lambda runtime produces when the function throws.
#[derive(Deserialize)]
struct LambdaErrorEnvelope {
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
    trace: Option<Vec<String>>,
}

/// Reconstruct the remote failure from a `FunctionError` payload, matching
/// the shape queue-mode replies produce. Payloads that are not the runtime
/// envelope keep their raw bytes in the message, with the AWS marker
/// (`Handled` / `Unhandled`) as the name.
fn remote_error_from_payload(marker: String, payload: String) -> RemoteError {
    if let Ok(envelope) = serde_json::from_str::<LambdaErrorEnvelope>(&payload) {
        if envelope.error_type.is_some() || envelope.error_message.is_some() {
            return RemoteError {
                name: envelope.error_type.unwrap_or(marker),
                message: envelope.error_message.unwrap_or(payload),
                stack: envelope.trace.map(|trace| trace.join("\n")),
            };
        }
    }
    RemoteError {
        name: marker,
        message: payload,
        stack: None,
    }
}

/// Register the slot, make sure a collector is listening, then publish.
pub(crate) async fn invoke_queue(state: &AwsState, call: &FunctionCall) -> Result<Invocation> {
    let topic_arn = state
        .resources
        .request_topic_arn
        .as_deref()
        .ok_or_else(|| ProviderError::Transport("instance has no request topic".to_string()))?;

    let (receiver, start_collector) = state.pending.register(&call.call_id);
    if start_collector {
        state.start_collector().await;
    }

    let body = call.encode()?;
    debug!(call_id = %call.call_id, "publishing call to request topic");
    if let Err(e) = state
        .services
        .sns
        .publish()
        .topic_arn(topic_arn)
        .message(body)
        .send()
        .await
    {
        state.pending.discard(&call.call_id);
        return Err(ProviderError::Transport(e.to_string()));
    }

    // A dropped sender means the collector went away without resolving us;
    // that only happens on teardown.
    let (ret, raw_body) = receiver.await.map_err(|_| ProviderError::Cancelled)??;
    Ok(into_invocation(ret, RawResponse::Queue(raw_body)))
}

/// Decode and emit the invocation log tail of a failed direct call.
fn emit_log_tail(function_name: &str, tail: &str) {
    match BASE64.decode(tail) {
        Ok(bytes) => error!(
            function = %function_name,
            log_tail = %String::from_utf8_lossy(&bytes),
            "remote function failed"
        ),
        Err(_) => error!(
            function = %function_name,
            log_tail = %tail,
            "remote function failed (log tail not base64)"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_parsed() {
        let payload = r#"{"errorType":"TypeError","errorMessage":"x","trace":["TypeError: x","    at boom"]}"#;
        let err = remote_error_from_payload("Unhandled".to_string(), payload.to_string());

        assert_eq!(err.name, "TypeError");
        assert_eq!(err.message, "x");
        assert_eq!(err.stack.as_deref(), Some("TypeError: x\n    at boom"));
    }

    #[test]
    fn test_error_envelope_without_trace() {
        let payload = r#"{"errorType":"Error","errorMessage":"boom"}"#;
        let err = remote_error_from_payload("Handled".to_string(), payload.to_string());

        assert_eq!(err.name, "Error");
        assert_eq!(err.message, "boom");
        assert!(err.stack.is_none());
    }

    #[test]
    fn test_non_envelope_payload_preserved_raw() {
        let payload = "Task timed out after 60.00 seconds";
        let err = remote_error_from_payload("Unhandled".to_string(), payload.to_string());

        assert_eq!(err.name, "Unhandled");
        assert_eq!(err.message, payload);
        assert!(err.stack.is_none());
    }

    #[test]
    fn test_empty_json_object_preserved_raw() {
        let err = remote_error_from_payload("Unhandled".to_string(), "{}".to_string());

        assert_eq!(err.name, "Unhandled");
        assert_eq!(err.message, "{}");
    }

    #[test]
    fn test_partial_envelope_falls_back_to_marker() {
        let payload = r#"{"errorMessage":"x"}"#;
        let err = remote_error_from_payload("Unhandled".to_string(), payload.to_string());

        assert_eq!(err.name, "Unhandled");
        assert_eq!(err.message, "x");
    }
}
