// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Teardown engine.
//!
//! Deletion runs in the inverse of the provisioning order. Every step is
//! best-effort: absence is not an error, and the manifest being a superset
//! of what exists is expected. Running teardown concurrently with invokes
//! is safe - the stop sentinel makes the collector fail every pending call
//! with `Cancelled`.
//!
//! Known leak: SNS writes delivery-status logs to a log group whose name
//! has no programmatic lookup from anything we hold; it is not cleaned up.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collector;
use crate::config::RolePolicy;
use crate::error::Result;
use crate::iam;
use crate::provider::AwsState;

/// How long to wait for a long-poll loop to consume its stop sentinel
/// before aborting it.
const LOOP_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Tear the instance down. Idempotent: the second run returns without
/// touching the cloud.
pub(crate) async fn run(state: &mut AwsState) -> Result<()> {
    if state.cleaned {
        debug!("cleanup already ran, nothing to do");
        return Ok(());
    }
    let services = state.services.clone();

    if let Some(subscription_arn) = state.resources.subscription_arn.take() {
        if let Err(e) = services
            .sns
            .unsubscribe()
            .subscription_arn(&subscription_arn)
            .send()
            .await
        {
            debug!(error = %e, "unsubscribe failed");
        }
    }

    // Stop both long-poll loops before their queues disappear.
    if let Some(queue_url) = state.resources.response_queue_url.clone() {
        if let Err(e) = collector::send_stop_sentinel(&services.sqs, &queue_url).await {
            debug!(error = %e, "stop sentinel to response queue failed");
        }
    }
    if let Some(queue_url) = state.resources.dead_letter_queue_url.clone() {
        if let Err(e) = collector::send_stop_sentinel(&services.sqs, &queue_url).await {
            debug!(error = %e, "stop sentinel to dead-letter queue failed");
        }
    }
    join_loop(state.collector.lock().await.take(), "response collector").await;
    join_loop(state.dlq_drain.lock().await.take(), "dead-letter drain").await;
    // Calls registered after the sentinel was consumed have no collector
    // left to cancel them.
    state.pending.cancel_all();

    if let Err(e) = services
        .lambda
        .delete_function()
        .function_name(&state.resources.function_name)
        .send()
        .await
    {
        debug!(function = %state.resources.function_name, error = %e, "delete function failed");
    }

    if let Err(e) = services
        .logs
        .delete_log_group()
        .log_group_name(&state.resources.log_group_name)
        .send()
        .await
    {
        debug!(log_group = %state.resources.log_group_name, error = %e, "delete log group failed");
    }

    if state.resources.role_policy == RolePolicy::Ephemeral {
        iam::delete_role(&services.iam, &state.resources.role_name).await;
    }
    // The feedback role is cached under a well-known name; it outlives the
    // instance deliberately.

    if let Some(topic_arn) = state.resources.request_topic_arn.take() {
        if let Err(e) = services.sns.delete_topic().topic_arn(&topic_arn).send().await {
            debug!(error = %e, "delete topic failed");
        }
    }

    if let Some(queue_url) = state.resources.response_queue_url.take() {
        if let Err(e) = services.sqs.delete_queue().queue_url(&queue_url).send().await {
            debug!(error = %e, "delete response queue failed");
        }
    }

    if let Some(queue_url) = state.resources.dead_letter_queue_url.take() {
        if let Err(e) = services.sqs.delete_queue().queue_url(&queue_url).send().await {
            debug!(error = %e, "delete dead-letter queue failed");
        }
    }

    state.cleaned = true;
    info!(function = %state.resources.function_name, "instance torn down");
    Ok(())
}

async fn join_loop(handle: Option<JoinHandle<()>>, task: &str) {
    let Some(handle) = handle else { return };
    let abort = handle.abort_handle();
    match tokio::time::timeout(LOOP_JOIN_TIMEOUT, handle).await {
        Ok(Ok(())) => debug!(task, "loop stopped"),
        Ok(Err(e)) => warn!(task, error = %e, "loop task failed"),
        Err(_) => {
            warn!(task, "loop did not consume its stop sentinel in time, aborting");
            abort.abort();
        }
    }
}
