// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Caller-facing invocation result types.

use std::fmt;

use aws_sdk_lambda::operation::invoke::InvokeOutput;
use cloudify_protocol::{ErrorDetail, FunctionReturn};

/// Result of one call through the provider.
///
/// Exactly one of `value` and `error` is set. A remote function that threw
/// still produces an `Invocation` - only transport and cancellation failures
/// are reported as errors at the call site.
#[derive(Debug)]
pub struct Invocation {
    /// The remote function's return value.
    pub value: Option<serde_json::Value>,
    /// The remote function's failure, when it threw.
    pub error: Option<RemoteError>,
    /// The underlying response envelope, for observability.
    pub raw: RawResponse,
}

/// The raw response envelope an invocation came back in.
#[derive(Debug)]
pub enum RawResponse {
    /// Direct mode: the Lambda invoke output.
    Direct(Box<InvokeOutput>),
    /// Queue mode: the reply message body.
    Queue(String),
}

/// A failure reported by the remote function, reconstructed from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// Error class name.
    pub name: String,
    /// Error message. For direct-mode `FunctionError` responses this holds
    /// the raw payload bytes verbatim.
    pub message: String,
    /// Remote stack trace, when captured.
    pub stack: Option<String>,
}

impl From<ErrorDetail> for RemoteError {
    fn from(detail: ErrorDetail) -> Self {
        Self {
            name: detail.name,
            message: detail.message,
            stack: detail.stack,
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Map a wire-level return onto the caller-facing invocation result.
pub(crate) fn into_invocation(ret: FunctionReturn, raw: RawResponse) -> Invocation {
    match ret {
        FunctionReturn::Value { value } => Invocation {
            value: Some(value),
            error: None,
            raw,
        },
        FunctionReturn::Error { value } => Invocation {
            value: None,
            error: Some(value.into()),
            raw,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_return_maps_to_value() {
        let inv = into_invocation(
            FunctionReturn::value(json!(5)),
            RawResponse::Queue("{}".to_string()),
        );
        assert_eq!(inv.value, Some(json!(5)));
        assert!(inv.error.is_none());
    }

    #[test]
    fn test_error_return_maps_to_error() {
        let inv = into_invocation(
            FunctionReturn::error(ErrorDetail::new("TypeError", "x")),
            RawResponse::Queue("{}".to_string()),
        );
        assert!(inv.value.is_none());
        let err = inv.error.unwrap();
        assert_eq!(err.name, "TypeError");
        assert_eq!(err.message, "x");
        assert!(err.stack.is_none());
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError {
            name: "TypeError".to_string(),
            message: "x".to_string(),
            stack: None,
        };
        assert_eq!(err.to_string(), "TypeError: x");
    }

    #[test]
    fn test_remote_error_from_detail_keeps_stack() {
        let err: RemoteError = ErrorDetail {
            message: "m".to_string(),
            name: "Error".to_string(),
            stack: Some("trace".to_string()),
        }
        .into();
        assert_eq!(err.stack.as_deref(), Some("trace"));
    }
}
