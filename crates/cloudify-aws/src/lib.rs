// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cloudify AWS - Lambda provider: lifecycle and dispatch engine
//!
//! This crate turns a module of ordinary functions into ephemeral Lambda
//! invocations. A caller registers the module once and thereafter invokes
//! its functions as if they were local; the provider ships the code, stands
//! up every supporting resource, routes each call, collects its result, and
//! reclaims everything it created.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────────────────────┐
//!                      │          AwsProvider         │
//!                      │  initialize / invoke /       │
//!                      │  cleanup / cleanup_resources │
//!                      └──────┬───────────────┬───────┘
//!              direct invoke  │               │  publish
//!                             ▼               ▼
//!                      ┌────────────┐  ┌───────────────┐
//!                      │   Lambda   │  │ request topic │
//!                      │  function  │◀─│     (SNS)     │
//!                      └─────┬──────┘  └───────────────┘
//!                            │ FunctionReturn
//!                            ▼
//!       ┌───────────────┐  ┌────────────────┐
//!       │  dead-letter  │◀─│ response queue │
//!       │  queue (SQS)  │  │     (SQS)      │
//!       └───────┬───────┘  └───────┬────────┘
//!               │ drain            │ long-poll
//!               ▼                  ▼
//!       ┌───────────────┐  ┌────────────────────┐
//!       │   DLQ drain   │  │ response collector │──▶ pending-call map
//!       └───────────────┘  └────────────────────┘    (CallId → slot)
//! ```
//!
//! # Invocation modes
//!
//! | Mode | Path | Reply |
//! |------|------|-------|
//! | direct | synchronous Lambda invoke | invocation payload |
//! | queue | publish to request topic | response queue, correlated by call id |
//!
//! In queue mode the reply channel is shared by every in-flight call; the
//! response collector demultiplexes by call id. Exactly one collector runs
//! while calls are pending, and none otherwise.
//!
//! # Modules
//!
//! - [`config`]: provider options
//! - [`error`]: error types surfaced at the provider boundary
//! - [`manifest`]: the serializable resource manifest
//! - [`packager`]: the consumed code-packager contract
//! - [`pending`]: pending-call correlation map
//! - [`provider`]: the provider contract and its AWS implementation
//! - [`services`]: shared SDK client handles
//! - [`types`]: caller-facing invocation results

pub mod config;
pub mod error;
pub mod manifest;
pub mod packager;
pub mod pending;
pub mod provider;
pub mod services;
pub mod types;

mod cleanup;
mod collector;
mod dispatch;
mod iam;
mod poll;
mod provision;

pub use config::{AwsOptions, LambdaOverrides, RolePolicy};
pub use error::{ProviderError, Result};
pub use manifest::AwsResources;
pub use packager::{PackagedModule, Packager};
pub use provider::{AwsProvider, AwsState, CloudProvider};
pub use services::AwsServices;
pub use types::{Invocation, RawResponse, RemoteError};
