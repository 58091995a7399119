// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cloudify Protocol - wire contract between callers and the trampoline
//!
//! This crate defines the JSON messages that cross the boundary between a
//! caller process and the trampoline running inside the cloud function:
//!
//! ```text
//! ┌────────────┐  FunctionCall (JSON)   ┌─────────────────┐
//! │   Caller   │ ─────────────────────▶ │ Cloud function  │
//! │ (provider) │                        │  (trampoline)   │
//! │            │ ◀───────────────────── │                 │
//! └────────────┘  FunctionReturn (JSON) └─────────────────┘
//! ```
//!
//! In direct mode the `FunctionReturn` comes back as the synchronous
//! invocation payload. In queue mode the trampoline publishes it to the
//! response queue named in the request, tagging the message with the call id
//! so the caller-side collector can route it without parsing the body.
//!
//! The crate also fixes the stop-sentinel format used to terminate the
//! caller-side long-poll loops. Sentinels are identified purely by message
//! attribute; their body is never inspected.

#![deny(missing_docs)]

pub mod wire;

pub use wire::{
    CALL_ID_ATTRIBUTE, ErrorDetail, FunctionCall, FunctionReturn, STOP_ATTRIBUTE, STOP_BODY,
    STOP_VALUE, WireError, new_call_id,
};
