// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ordered resource bring-up.
//!
//! Dependency order, leaves first: execution role, log group, dead-letter
//! queue (with its drain), function, feedback role, request topic, response
//! queue, subscription. Function creation is begun early and awaited after
//! the queue resources, because a freshly created role is not assumable
//! right away and the create call itself must be polled.

use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{DeadLetterConfig, Environment, FunctionCode, Runtime};
use aws_sdk_sqs::types::QueueAttributeName;
use serde_json::json;
use tracing::{debug, info};

use crate::collector;
use crate::config::{AwsOptions, LambdaOverrides};
use crate::error::{ProviderError, Result};
use crate::iam::{self, TrustService};
use crate::packager::{DEFAULT_RUNTIME, DIRECT_HANDLER, QUEUE_HANDLER};
use crate::poll::{self, PollSettings};
use crate::provider::AwsState;

/// Log group retention, in days.
const LOG_RETENTION_DAYS: i32 = 1;

/// Redrive attempts before a response message lands in the DLQ.
const REDRIVE_MAX_RECEIVE_COUNT: u32 = 5;

fn topic_name(function_name: &str) -> String {
    format!("{function_name}-Requests")
}

fn response_queue_name(function_name: &str) -> String {
    format!("{function_name}-Responses")
}

fn dlq_name(function_name: &str) -> String {
    format!("{function_name}-DLQ")
}

/// Stand the instance up. Resources are recorded in `state.resources` as
/// they are created, so a failure at any step leaves behind a manifest the
/// caller can tear down.
pub(crate) async fn provision(
    state: &mut AwsState,
    options: &AwsOptions,
    archive: Vec<u8>,
) -> Result<()> {
    let services = state.services.clone();
    let function_name = state.resources.function_name.clone();
    let role_name = state.resources.role_name.clone();

    let role_arn = iam::ensure_role(
        &services.iam,
        &role_name,
        TrustService::Lambda,
        &options.policy_arn,
    )
    .await?;
    iam::attach_deny_log_group(&services.iam, &role_name).await?;

    // The group is created here, not by the function, so it carries a
    // retention policy and is covered by teardown.
    services
        .logs
        .create_log_group()
        .log_group_name(&state.resources.log_group_name)
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("create log group", e))?;
    services
        .logs
        .put_retention_policy()
        .log_group_name(&state.resources.log_group_name)
        .retention_in_days(LOG_RETENTION_DAYS)
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("set log retention", e))?;
    debug!(log_group = %state.resources.log_group_name, "log group created");

    let mut dlq_arn = None;
    if options.use_queue {
        let url = create_queue(
            &services.sqs,
            &dlq_name(&function_name),
            options.timeout,
            None,
        )
        .await?;
        state.resources.dead_letter_queue_url = Some(url.clone());
        dlq_arn = Some(queue_arn(&services.sqs, &url).await?);

        let drain = collector::spawn_dlq_drain(services.sqs.clone(), url);
        *state.dlq_drain.lock().await = Some(drain);
    }

    // Nonce collision is fatal; it should never recur.
    if services
        .lambda
        .get_function()
        .function_name(&function_name)
        .send()
        .await
        .is_ok()
    {
        return Err(ProviderError::NameCollision { function_name });
    }

    let default_handler = if options.use_queue {
        QUEUE_HANDLER
    } else {
        DIRECT_HANDLER
    };
    let create_task = tokio::spawn(create_function(
        services.lambda.clone(),
        function_name.clone(),
        role_arn,
        default_handler.to_string(),
        archive,
        options.timeout,
        options.memory_size,
        dlq_arn.clone(),
        options.lambda_overrides.clone(),
    ));

    let queue_setup = if options.use_queue {
        setup_queue_resources(state, options, &function_name, dlq_arn.as_deref()).await
    } else {
        Ok(())
    };

    // Join the creation task before propagating any queue-setup failure, so
    // teardown never races a create still in flight.
    let created = create_task
        .await
        .map_err(|e| ProviderError::provisioning("create function", e))
        .and_then(|result| result);
    queue_setup?;
    let function_arn = created?;

    if let Some(topic_arn) = state.resources.request_topic_arn.clone() {
        services
            .lambda
            .add_permission()
            .function_name(&function_name)
            .statement_id("cloudify-sns-invoke")
            .action("lambda:InvokeFunction")
            .principal("sns.amazonaws.com")
            .source_arn(&topic_arn)
            .send()
            .await
            .map_err(|e| ProviderError::provisioning("grant sns invoke", e))?;

        let subscribed = services
            .sns
            .subscribe()
            .topic_arn(&topic_arn)
            .protocol("lambda")
            .endpoint(&function_arn)
            .return_subscription_arn(true)
            .send()
            .await
            .map_err(|e| ProviderError::provisioning("subscribe function", e))?;
        state.resources.subscription_arn = subscribed.subscription_arn().map(str::to_string);
    }

    info!(function = %function_name, "instance provisioned");
    Ok(())
}

/// Feedback role, request topic, and response queue, built while the
/// function creation settles.
async fn setup_queue_resources(
    state: &mut AwsState,
    options: &AwsOptions,
    function_name: &str,
    dlq_arn: Option<&str>,
) -> Result<()> {
    let services = state.services.clone();

    let feedback_arn = iam::ensure_role(
        &services.iam,
        iam::SNS_FEEDBACK_ROLE,
        TrustService::Sns,
        iam::SNS_FEEDBACK_POLICY_ARN,
    )
    .await?;
    state.resources.feedback_role_name = Some(iam::SNS_FEEDBACK_ROLE.to_string());

    let topic_arn = create_topic(&services.sns, &topic_name(function_name)).await?;
    state.resources.request_topic_arn = Some(topic_arn.clone());

    // A fresh topic will not immediately accept an attribute naming a
    // fresh role.
    poll::until_ready("set topic feedback role", &PollSettings::default(), || {
        let sns = services.sns.clone();
        let topic_arn = topic_arn.clone();
        let feedback_arn = feedback_arn.clone();
        async move {
            sns.set_topic_attributes()
                .topic_arn(topic_arn)
                .attribute_name("LambdaFailureFeedbackRoleArn")
                .attribute_value(feedback_arn)
                .send()
                .await
        }
    })
    .await?;

    let dlq_arn =
        dlq_arn.ok_or_else(|| ProviderError::provisioning("create response queue", "no DLQ"))?;
    let redrive_policy = json!({
        "deadLetterTargetArn": dlq_arn,
        "maxReceiveCount": REDRIVE_MAX_RECEIVE_COUNT,
    })
    .to_string();
    let response_url = create_queue(
        &services.sqs,
        &response_queue_name(function_name),
        options.timeout,
        Some(redrive_policy),
    )
    .await?;
    state.resources.response_queue_url = Some(response_url);
    Ok(())
}

/// Create the function, retrying until the execution role becomes
/// assumable. Returns the function ARN.
#[allow(clippy::too_many_arguments)]
async fn create_function(
    lambda: aws_sdk_lambda::Client,
    function_name: String,
    role_arn: String,
    default_handler: String,
    archive: Vec<u8>,
    timeout: u32,
    memory_size: u32,
    dlq_arn: Option<String>,
    overrides: LambdaOverrides,
) -> Result<String> {
    let code = FunctionCode::builder()
        .zip_file(Blob::new(archive))
        .build();
    let runtime = Runtime::from(overrides.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME));
    let handler = overrides.handler.clone().unwrap_or(default_handler);

    let out = poll::until_ready("create function", &PollSettings::default(), || {
        let lambda = lambda.clone();
        let function_name = function_name.clone();
        let role_arn = role_arn.clone();
        let handler = handler.clone();
        let code = code.clone();
        let runtime = runtime.clone();
        let dlq_arn = dlq_arn.clone();
        let overrides = overrides.clone();
        async move {
            let mut request = lambda
                .create_function()
                .function_name(function_name)
                .role(role_arn)
                .runtime(runtime)
                .handler(handler)
                .code(code)
                .timeout(timeout as i32)
                .memory_size(memory_size as i32);
            if let Some(arn) = dlq_arn {
                request =
                    request.dead_letter_config(DeadLetterConfig::builder().target_arn(arn).build());
            }
            if let Some(description) = overrides.description {
                request = request.description(description);
            }
            if !overrides.environment.is_empty() {
                request = request.environment(
                    Environment::builder()
                        .set_variables(Some(overrides.environment))
                        .build(),
                );
            }
            request.send().await
        }
    })
    .await?;

    out.function_arn()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::provisioning("create function", "response carried no ARN"))
}

async fn create_queue(
    sqs: &aws_sdk_sqs::Client,
    name: &str,
    visibility_timeout: u32,
    redrive_policy: Option<String>,
) -> Result<String> {
    let mut request = sqs.create_queue().queue_name(name).attributes(
        QueueAttributeName::VisibilityTimeout,
        visibility_timeout.to_string(),
    );
    if let Some(policy) = redrive_policy {
        request = request.attributes(QueueAttributeName::RedrivePolicy, policy);
    }
    let out = request
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("create queue", e))?;
    out.queue_url()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::provisioning("create queue", "response carried no URL"))
}

async fn queue_arn(sqs: &aws_sdk_sqs::Client, queue_url: &str) -> Result<String> {
    let out = sqs
        .get_queue_attributes()
        .queue_url(queue_url)
        .attribute_names(QueueAttributeName::QueueArn)
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("get queue arn", e))?;
    out.attributes()
        .and_then(|attrs| attrs.get(&QueueAttributeName::QueueArn))
        .cloned()
        .ok_or_else(|| ProviderError::provisioning("get queue arn", "attribute missing"))
}

async fn create_topic(sns: &aws_sdk_sns::Client, name: &str) -> Result<String> {
    let out = sns
        .create_topic()
        .name(name)
        .send()
        .await
        .map_err(|e| ProviderError::provisioning("create topic", e))?;
    out.topic_arn()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::provisioning("create topic", "response carried no ARN"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_and_topic_names() {
        assert_eq!(topic_name("cloudify-x"), "cloudify-x-Requests");
        assert_eq!(response_queue_name("cloudify-x"), "cloudify-x-Responses");
        assert_eq!(dlq_name("cloudify-x"), "cloudify-x-DLQ");
    }

    #[test]
    fn test_redrive_policy_shape() {
        let policy = json!({
            "deadLetterTargetArn": "arn:aws:sqs:us-west-2:1:q",
            "maxReceiveCount": REDRIVE_MAX_RECEIVE_COUNT,
        });
        assert_eq!(policy["maxReceiveCount"], 5);
        assert_eq!(policy["deadLetterTargetArn"], "arn:aws:sqs:us-west-2:1:q");
    }
}
