// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the AWS provider.
//!
//! Remote function failures are deliberately *not* here: they surface
//! through the `error` field of an invocation result, never as a thrown
//! error. This enum covers provisioning, transport, and teardown-time
//! failures only.

use thiserror::Error;

/// Result type using ProviderError.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors surfaced at the provider boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// A resource-creation call failed permanently during initialize.
    /// The instance is unusable; partial state has already been torn down.
    #[error("provisioning failed at '{stage}': {message}")]
    Provisioning {
        /// The provisioning step that failed.
        stage: &'static str,
        /// Error details from the SDK.
        message: String,
    },

    /// A bounded readiness poll ran out of attempts.
    #[error("'{operation}' not ready after {attempts} attempts")]
    ProvisioningTimeout {
        /// The operation that never became ready.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A function with the derived name already exists.
    #[error("function '{function_name}' already exists")]
    NameCollision {
        /// The colliding function name.
        function_name: String,
    },

    /// A serialized manifest could not be used to drive teardown.
    #[error("malformed resource manifest: {0}")]
    MalformedManifest(String),

    /// A pending call was aborted by teardown.
    #[error("call cancelled by cleanup")]
    Cancelled,

    /// The invocation itself could not be transported to or from the cloud.
    #[error("transport error: {0}")]
    Transport(String),

    /// Wire-format encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Wrap an SDK failure as a provisioning error for the given stage.
    pub(crate) fn provisioning(stage: &'static str, err: impl std::fmt::Display) -> Self {
        ProviderError::Provisioning {
            stage,
            message: err.to_string(),
        }
    }
}

impl From<cloudify_protocol::WireError> for ProviderError {
    fn from(err: cloudify_protocol::WireError) -> Self {
        match err {
            cloudify_protocol::WireError::Json(e) => ProviderError::Serialization(e),
        }
    }
}
