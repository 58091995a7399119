// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! IAM role management.
//!
//! Both role modes share one create-or-reuse subroutine. Lookup failures
//! are swallowed: absence shows up as a failed lookup, and telling absence
//! apart from a transient error is unnecessary because creation fails
//! loudly on its own.

use aws_sdk_iam::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};

/// Well-known name of the cached execution role.
pub const CACHED_EXECUTION_ROLE: &str = "cloudify-cached-lambda-role";

/// Well-known name of the SNS failure-feedback role. Always cached.
pub const SNS_FEEDBACK_ROLE: &str = "cloudify-sns-feedback-role";

/// Managed policy attached to the feedback role so SNS can write delivery
/// status logs.
pub const SNS_FEEDBACK_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonSNSRole";

/// Name of the inline policy denying log-group auto-creation.
pub const DENY_LOG_GROUP_POLICY: &str = "cloudify-deny-create-log-group";

/// Which service a role trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrustService {
    /// Execution role assumed by Lambda.
    Lambda,
    /// Failure-feedback role assumed by SNS.
    Sns,
}

impl TrustService {
    fn principal(&self) -> &'static str {
        match self {
            Self::Lambda => "lambda.amazonaws.com",
            Self::Sns => "sns.amazonaws.com",
        }
    }
}

fn assume_role_document(service: TrustService) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service.principal() },
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string()
}

fn deny_log_group_document() -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Deny",
            "Action": "logs:CreateLogGroup",
            "Resource": "*"
        }]
    })
    .to_string()
}

/// Look up the role; create it with the given trust policy and attach the
/// managed policy if it does not exist. Returns the role ARN.
pub(crate) async fn ensure_role(
    iam: &Client,
    role_name: &str,
    service: TrustService,
    policy_arn: &str,
) -> Result<String> {
    match iam.get_role().role_name(role_name).send().await {
        Ok(out) => {
            if let Some(role) = out.role() {
                debug!(role_name, "reusing existing role");
                return Ok(role.arn().to_string());
            }
        }
        Err(e) => debug!(role_name, error = %e, "role lookup failed, creating"),
    }

    let created = iam
        .create_role()
        .role_name(role_name)
        .assume_role_policy_document(assume_role_document(service))
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("create role", e))?;
    let arn = created
        .role()
        .map(|r| r.arn().to_string())
        .ok_or_else(|| ProviderError::provisioning("create role", "response carried no role"))?;

    iam.attach_role_policy()
        .role_name(role_name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("attach role policy", e))?;

    info!(role_name, "created role");
    Ok(arn)
}

/// Attach the inline deny policy that stops the function from re-creating
/// its log group. The group is created separately with a retention policy;
/// an auto-created one would have none and escape teardown.
pub(crate) async fn attach_deny_log_group(iam: &Client, role_name: &str) -> Result<()> {
    iam.put_role_policy()
        .role_name(role_name)
        .policy_name(DENY_LOG_GROUP_POLICY)
        .policy_document(deny_log_group_document())
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("attach deny-log-group policy", e))?;
    Ok(())
}

/// Best-effort deletion of an ephemeral role: detach every managed policy,
/// delete every inline policy, then delete the role. Absence is fine.
pub(crate) async fn delete_role(iam: &Client, role_name: &str) {
    match iam
        .list_attached_role_policies()
        .role_name(role_name)
        .send()
        .await
    {
        Ok(out) => {
            for policy in out.attached_policies() {
                if let Some(arn) = policy.policy_arn() {
                    if let Err(e) = iam
                        .detach_role_policy()
                        .role_name(role_name)
                        .policy_arn(arn)
                        .send()
                        .await
                    {
                        warn!(role_name, policy_arn = arn, error = %e, "detach policy failed");
                    }
                }
            }
        }
        Err(e) => debug!(role_name, error = %e, "listing attached policies failed"),
    }

    match iam.list_role_policies().role_name(role_name).send().await {
        Ok(out) => {
            for policy_name in out.policy_names() {
                if let Err(e) = iam
                    .delete_role_policy()
                    .role_name(role_name)
                    .policy_name(policy_name)
                    .send()
                    .await
                {
                    warn!(role_name, policy_name, error = %e, "delete inline policy failed");
                }
            }
        }
        Err(e) => debug!(role_name, error = %e, "listing inline policies failed"),
    }

    match iam.delete_role().role_name(role_name).send().await {
        Ok(_) => info!(role_name, "deleted role"),
        Err(e) => debug!(role_name, error = %e, "delete role failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambda_trust_document() {
        let doc = assume_role_document(TrustService::Lambda);
        let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(
            parsed["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
        assert_eq!(parsed["Statement"][0]["Action"], "sts:AssumeRole");
    }

    #[test]
    fn test_sns_trust_document() {
        let doc = assume_role_document(TrustService::Sns);
        let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(
            parsed["Statement"][0]["Principal"]["Service"],
            "sns.amazonaws.com"
        );
    }

    #[test]
    fn test_deny_log_group_document() {
        let doc = deny_log_group_document();
        let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(parsed["Statement"][0]["Effect"], "Deny");
        assert_eq!(parsed["Statement"][0]["Action"], "logs:CreateLogGroup");
    }
}
