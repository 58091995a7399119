// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Long-poll loops over the response and dead-letter queues.
//!
//! The response collector is the demultiplexer of queue mode: it owns the
//! reply queue while calls are in flight, routes each message to the slot
//! registered under its call id, and exits when the pending map drains.
//! The dead-letter drain is its fire-and-forget sibling; DLQ traffic is
//! logged, never surfaced to callers, because it holds invocations that
//! never reached the trampoline.
//!
//! Both loops terminate on a stop sentinel (message attribute
//! `cloudify=stop`). Messages are batch-deleted immediately after receipt;
//! at-most-once delivery is acceptable because replies are correlated by
//! opaque call id.
//!
//! Queue visibility timeout equals the function timeout, so a call that
//! runs longer than the function timeout may see its reply redelivered.

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, Message, MessageAttributeValue};
use cloudify_protocol::{CALL_ID_ATTRIBUTE, FunctionReturn, STOP_ATTRIBUTE, STOP_BODY, STOP_VALUE};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::pending::PendingCalls;

/// Long-poll wait per receive call, in seconds (the SQS maximum).
const POLL_WAIT_SECONDS: i32 = 20;

/// Messages per receive batch (the SQS maximum).
const POLL_BATCH_SIZE: i32 = 10;

/// Back-off after a failed receive before polling again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Spawn the response collector. Exactly one runs while the pending map is
/// non-empty; the caller guards that via [`PendingCalls::register`].
pub(crate) fn spawn_response_collector(
    sqs: Client,
    queue_url: String,
    pending: Arc<PendingCalls>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(queue_url = %queue_url, "response collector started");
        collect_responses(&sqs, &queue_url, &pending).await;
        debug!(queue_url = %queue_url, "response collector stopped");
    })
}

async fn collect_responses(sqs: &Client, queue_url: &str, pending: &PendingCalls) {
    loop {
        let messages = match receive_batch(sqs, queue_url).await {
            Ok(messages) => messages,
            Err(e) => {
                // Teardown may have deleted the queue out from under us;
                // once nothing is pending there is no reason to keep trying.
                if pending.finish_if_idle() {
                    return;
                }
                warn!(error = %e, "response queue receive failed");
                tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                continue;
            }
        };

        delete_batch(sqs, queue_url, &messages);

        let mut replies: Vec<(String, String)> = Vec::with_capacity(messages.len());
        for message in &messages {
            if is_stop_sentinel(message) {
                debug!("stop sentinel received, cancelling pending calls");
                pending.cancel_all();
                return;
            }
            match call_id_of(message) {
                Some(call_id) => {
                    let body = message.body().unwrap_or_default().to_string();
                    replies.push((call_id.to_string(), body));
                }
                None => warn!(
                    message_id = message.message_id().unwrap_or_default(),
                    "reply without call id dropped"
                ),
            }
        }

        for (call_id, body) in replies {
            let reply = FunctionReturn::decode(&body)
                .map(|ret| (ret, body))
                .map_err(crate::error::ProviderError::from);
            if !pending.complete(&call_id, reply) {
                warn!(call_id = %call_id, "reply for unknown call id dropped");
            }
        }

        // Same critical section as the emptiness check: a caller enqueueing
        // right now either sees the running flag still set, or starts a
        // fresh collector.
        if pending.finish_if_idle() {
            return;
        }
    }
}

/// Spawn the dead-letter drain. Runs from provisioning until teardown.
pub(crate) fn spawn_dlq_drain(sqs: Client, queue_url: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(queue_url = %queue_url, "dead-letter drain started");
        drain_dead_letters(&sqs, &queue_url).await;
        debug!(queue_url = %queue_url, "dead-letter drain stopped");
    })
}

async fn drain_dead_letters(sqs: &Client, queue_url: &str) {
    loop {
        let messages = match receive_batch(sqs, queue_url).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "dead-letter queue receive failed");
                tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                continue;
            }
        };

        delete_batch(sqs, queue_url, &messages);

        for message in &messages {
            if is_stop_sentinel(message) {
                return;
            }
            error!(
                body = message.body().unwrap_or_default(),
                "dead-letter message received"
            );
        }
    }
}

async fn receive_batch(sqs: &Client, queue_url: &str) -> Result<Vec<Message>> {
    let out = sqs
        .receive_message()
        .queue_url(queue_url)
        .wait_time_seconds(POLL_WAIT_SECONDS)
        .max_number_of_messages(POLL_BATCH_SIZE)
        .message_attribute_names("All")
        .send()
        .await
        .map_err(|e| crate::error::ProviderError::Transport(e.to_string()))?;
    Ok(out.messages.unwrap_or_default())
}

/// Fire-and-forget batch delete. Losing a delete only means a redelivery
/// that the unknown-call-id path drops.
fn delete_batch(sqs: &Client, queue_url: &str, messages: &[Message]) {
    let entries: Vec<DeleteMessageBatchRequestEntry> = messages
        .iter()
        .enumerate()
        .filter_map(|(i, message)| {
            let receipt = message.receipt_handle()?;
            DeleteMessageBatchRequestEntry::builder()
                .id(i.to_string())
                .receipt_handle(receipt)
                .build()
                .ok()
        })
        .collect();
    if entries.is_empty() {
        return;
    }

    let sqs = sqs.clone();
    let queue_url = queue_url.to_string();
    tokio::spawn(async move {
        if let Err(e) = sqs
            .delete_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
        {
            debug!(error = %e, "batch delete failed");
        }
    });
}

/// Send the sentinel that terminates a long-poll loop on `queue_url`.
pub(crate) async fn send_stop_sentinel(sqs: &Client, queue_url: &str) -> Result<()> {
    let attribute = MessageAttributeValue::builder()
        .data_type("String")
        .string_value(STOP_VALUE)
        .build()
        .map_err(|e| crate::error::ProviderError::Transport(e.to_string()))?;
    sqs.send_message()
        .queue_url(queue_url)
        .message_body(STOP_BODY)
        .message_attributes(STOP_ATTRIBUTE, attribute)
        .send()
        .await
        .map_err(|e| crate::error::ProviderError::Transport(e.to_string()))?;
    Ok(())
}

fn is_stop_sentinel(message: &Message) -> bool {
    message
        .message_attributes()
        .and_then(|attrs| attrs.get(STOP_ATTRIBUTE))
        .and_then(|attr| attr.string_value())
        == Some(STOP_VALUE)
}

fn call_id_of(message: &Message) -> Option<&str> {
    message
        .message_attributes()?
        .get(CALL_ID_ATTRIBUTE)?
        .string_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_attribute(value: &str) -> MessageAttributeValue {
        MessageAttributeValue::builder()
            .data_type("String")
            .string_value(value)
            .build()
            .unwrap()
    }

    #[test]
    fn test_stop_sentinel_detected() {
        let message = Message::builder()
            .body(STOP_BODY)
            .message_attributes(STOP_ATTRIBUTE, string_attribute(STOP_VALUE))
            .build();
        assert!(is_stop_sentinel(&message));
        assert!(call_id_of(&message).is_none());
    }

    #[test]
    fn test_reply_message_classified() {
        let message = Message::builder()
            .body(r#"{"type":"value","value":2}"#)
            .message_attributes(CALL_ID_ATTRIBUTE, string_attribute("call-1"))
            .build();
        assert!(!is_stop_sentinel(&message));
        assert_eq!(call_id_of(&message), Some("call-1"));
    }

    #[test]
    fn test_message_without_attributes() {
        let message = Message::builder().body("whatever").build();
        assert!(!is_stop_sentinel(&message));
        assert!(call_id_of(&message).is_none());
    }

    #[test]
    fn test_wrong_attribute_value_is_not_sentinel() {
        let message = Message::builder()
            .body(STOP_BODY)
            .message_attributes(STOP_ATTRIBUTE, string_attribute("go"))
            .build();
        assert!(!is_stop_sentinel(&message));
    }
}
