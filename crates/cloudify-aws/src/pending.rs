// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The pending-call map.
//!
//! Every in-flight queue-mode call owns one single-assignment slot, keyed
//! by call id. The map and the collector-running flag live behind one lock
//! so the two state transitions that matter are atomic:
//!
//! - a caller registers its slot and learns, in the same critical section,
//!   whether it must start the collector;
//! - an exiting collector observes the map empty and clears the running
//!   flag in the same critical section, so a caller enqueueing at that
//!   instant starts a fresh collector instead of losing its reply.
//!
//! The lock is a plain `std::sync::Mutex`: no holder ever suspends.

use std::collections::HashMap;
use std::sync::Mutex;

use cloudify_protocol::FunctionReturn;
use tokio::sync::oneshot;

use crate::error::{ProviderError, Result};

/// A routed reply: the parsed return plus the raw message body it rode in.
pub type QueueReply = (FunctionReturn, String);

/// Receiving half of one call's slot.
pub type SlotReceiver = oneshot::Receiver<Result<QueueReply>>;

#[derive(Default)]
struct Inner {
    slots: HashMap<String, oneshot::Sender<Result<QueueReply>>>,
    collector_running: bool,
}

/// Map of call id to pending result slot, shared between callers and the
/// response collector.
#[derive(Default)]
pub struct PendingCalls {
    inner: Mutex<Inner>,
}

impl PendingCalls {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `call_id`. The boolean is true when the caller
    /// must start the collector: at most one registrant per idle period
    /// observes it.
    pub fn register(&self, call_id: &str) -> (SlotReceiver, bool) {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().expect("pending map lock poisoned");
        inner.slots.insert(call_id.to_string(), tx);
        let start_collector = !inner.collector_running;
        if start_collector {
            inner.collector_running = true;
        }
        (rx, start_collector)
    }

    /// Remove a slot without completing it. Used when the publish after
    /// registration fails and the caller reports the error itself.
    pub fn discard(&self, call_id: &str) {
        let mut inner = self.inner.lock().expect("pending map lock poisoned");
        inner.slots.remove(call_id);
    }

    /// Resolve the slot registered under `call_id`. Returns false when no
    /// such slot exists (late or alien reply).
    pub fn complete(&self, call_id: &str, reply: Result<QueueReply>) -> bool {
        let slot = {
            let mut inner = self.inner.lock().expect("pending map lock poisoned");
            inner.slots.remove(call_id)
        };
        match slot {
            Some(tx) => {
                // The caller may have dropped its receiver; that is its
                // business, not ours.
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    /// Fail every pending slot with `Cancelled` and mark the collector as
    /// stopped. Called by the collector when it consumes a stop sentinel.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = {
            let mut inner = self.inner.lock().expect("pending map lock poisoned");
            inner.collector_running = false;
            inner.slots.drain().collect()
        };
        for (_, tx) in drained {
            let _ = tx.send(Err(ProviderError::Cancelled));
        }
    }

    /// If the map is empty, clear the running flag and return true; the
    /// collector must then exit without touching the map again.
    pub fn finish_if_idle(&self) -> bool {
        let mut inner = self.inner.lock().expect("pending map lock poisoned");
        if inner.slots.is_empty() {
            inner.collector_running = false;
            true
        } else {
            false
        }
    }

    /// Number of in-flight calls.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("pending map lock poisoned").slots.len()
    }

    /// True when no calls are in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a collector task owns the reply queue.
    pub fn collector_running(&self) -> bool {
        self.inner
            .lock()
            .expect("pending map lock poisoned")
            .collector_running
    }
}
