// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The serializable resource manifest.
//!
//! The manifest names every cloud object an instance owns. It is a superset
//! of what currently exists: teardown driven from it tolerates resources
//! that were never created or are already gone. Optional fields are absent
//! exactly when the corresponding resource was not created (queue-mode
//! resources on a direct-mode instance, for example).

use serde::{Deserialize, Serialize};

use crate::config::RolePolicy;
use crate::error::{ProviderError, Result};

/// Every cloud resource one provider instance owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsResources {
    /// The cloud function name, derived from the instance nonce.
    #[serde(rename = "FunctionName")]
    pub function_name: String,
    /// The execution role name.
    #[serde(rename = "RoleName")]
    pub role_name: String,
    /// Whether the execution role is deleted at teardown.
    #[serde(rename = "rolePolicy")]
    pub role_policy: RolePolicy,
    /// The CloudWatch log group, pre-created with a 1-day retention.
    #[serde(rename = "logGroupName")]
    pub log_group_name: String,
    /// Region all SDK clients target. Required to reconstruct clients from
    /// a serialized manifest.
    #[serde(default)]
    pub region: String,
    /// Queue mode only: the request topic.
    #[serde(rename = "RequestTopicArn", default, skip_serializing_if = "Option::is_none")]
    pub request_topic_arn: Option<String>,
    /// Queue mode only: the response queue.
    #[serde(rename = "ResponseQueueUrl", default, skip_serializing_if = "Option::is_none")]
    pub response_queue_url: Option<String>,
    /// Queue mode only: the dead-letter queue.
    #[serde(rename = "DLQUrl", default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_queue_url: Option<String>,
    /// Queue mode only: the topic-to-function subscription.
    #[serde(rename = "SubscriptionArn", default, skip_serializing_if = "Option::is_none")]
    pub subscription_arn: Option<String>,
    /// Queue mode only: the SNS failure-feedback role. Always cached.
    #[serde(rename = "SNSFeedbackRole", default, skip_serializing_if = "Option::is_none")]
    pub feedback_role_name: Option<String>,
}

impl AwsResources {
    /// Serialize the manifest to its persisted JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a persisted manifest.
    ///
    /// Fails with [`ProviderError::MalformedManifest`] when the JSON cannot
    /// be parsed or names no region - without a region there is no way to
    /// reconstruct SDK clients for teardown.
    pub fn from_json(manifest: &str) -> Result<Self> {
        let resources: AwsResources = serde_json::from_str(manifest)
            .map_err(|e| ProviderError::MalformedManifest(e.to_string()))?;
        if resources.region.is_empty() {
            return Err(ProviderError::MalformedManifest(
                "manifest has no region".to_string(),
            ));
        }
        Ok(resources)
    }
}
