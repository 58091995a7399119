// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Correlation and cancellation tests for the pending-call map.
//!
//! Everything queue mode routes goes through this map, so the correlation,
//! ordering, and collector-uniqueness properties are enforced here without
//! touching AWS.

use std::sync::Arc;

use cloudify_aws::ProviderError;
use cloudify_aws::pending::PendingCalls;
use cloudify_protocol::{ErrorDetail, FunctionReturn, new_call_id};
use serde_json::json;

#[tokio::test]
async fn test_each_call_gets_its_own_reply() {
    let pending = PendingCalls::new();

    let ids: Vec<String> = (0..10).map(|_| new_call_id()).collect();
    let receivers: Vec<_> = ids.iter().map(|id| pending.register(id).0).collect();

    // Resolve in reverse order - reply interleaving is arbitrary.
    for (i, id) in ids.iter().enumerate().rev() {
        let delivered = pending.complete(
            id,
            Ok((FunctionReturn::value(json!(i)), format!("body-{i}"))),
        );
        assert!(delivered);
    }

    for (i, rx) in receivers.into_iter().enumerate() {
        let (ret, body) = rx.await.unwrap().unwrap();
        assert_eq!(ret, FunctionReturn::value(json!(i)));
        assert_eq!(body, format!("body-{i}"));
    }
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_reply_before_caller_awaits_still_resolves() {
    // The trampoline may reply before the caller's publish call returns;
    // registration happens first, so the reply must land either way.
    let pending = PendingCalls::new();
    let (rx, _) = pending.register("early");

    assert!(pending.complete(
        "early",
        Ok((FunctionReturn::value(json!("fast")), String::new()))
    ));

    let (ret, _) = rx.await.unwrap().unwrap();
    assert_eq!(ret, FunctionReturn::value(json!("fast")));
}

#[tokio::test]
async fn test_remote_failure_resolves_only_its_slot() {
    let pending = PendingCalls::new();
    let (rx_bad, _) = pending.register("bad");
    let (rx_good, _) = pending.register("good");

    pending.complete(
        "bad",
        Ok((
            FunctionReturn::error(ErrorDetail::new("TypeError", "x")),
            String::new(),
        )),
    );
    pending.complete(
        "good",
        Ok((FunctionReturn::value(json!(15)), String::new())),
    );

    let (bad_ret, _) = rx_bad.await.unwrap().unwrap();
    assert!(matches!(bad_ret, FunctionReturn::Error { .. }));

    let (good_ret, _) = rx_good.await.unwrap().unwrap();
    assert_eq!(good_ret, FunctionReturn::value(json!(15)));
}

#[tokio::test]
async fn test_cancel_fails_every_outstanding_call() {
    let pending = PendingCalls::new();
    let receivers: Vec<_> = (0..4)
        .map(|i| pending.register(&format!("call-{i}")).0)
        .collect();

    pending.cancel_all();

    for rx in receivers {
        assert!(matches!(rx.await.unwrap(), Err(ProviderError::Cancelled)));
    }
    assert!(pending.is_empty());
    assert!(!pending.collector_running());
}

#[tokio::test]
async fn test_at_most_one_collector_elected() {
    let pending = Arc::new(PendingCalls::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let pending = pending.clone();
            tokio::spawn(async move {
                let (_rx, start) = pending.register(&format!("c-{i}"));
                start
            })
        })
        .collect();

    let mut elected = 0;
    for handle in handles {
        if handle.await.unwrap() {
            elected += 1;
        }
    }
    assert_eq!(elected, 1);
    assert!(pending.collector_running());
}

#[tokio::test]
async fn test_collector_restart_after_drain() {
    let pending = PendingCalls::new();

    let (rx, started) = pending.register("one");
    assert!(started);
    pending.complete(
        "one",
        Ok((FunctionReturn::value(json!(null)), String::new())),
    );
    rx.await.unwrap().unwrap();

    // Collector observes the empty map and exits.
    assert!(pending.finish_if_idle());
    assert!(!pending.collector_running());

    // A caller enqueueing now must be told to start a fresh collector.
    let (_rx, started) = pending.register("two");
    assert!(started);
}

#[tokio::test]
async fn test_late_reply_after_cancel_is_dropped() {
    let pending = PendingCalls::new();
    let (rx, _) = pending.register("gone");
    pending.cancel_all();
    assert!(matches!(rx.await.unwrap(), Err(ProviderError::Cancelled)));

    // The reply arriving afterwards finds no slot.
    assert!(!pending.complete(
        "gone",
        Ok((FunctionReturn::value(json!(1)), String::new()))
    ));
}
