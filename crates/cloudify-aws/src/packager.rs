// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The code-packager contract.
//!
//! Packaging is an external collaborator: implementations bundle the user's
//! function module together with the trampoline entry points below, and
//! must externalize the provider SDK because the cloud runtime supplies it.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Direct-mode trampoline entry point: returns the `FunctionReturn` as the
/// synchronous invocation payload.
pub const DIRECT_HANDLER: &str = "index.trampoline";

/// Queue-mode trampoline entry point: publishes the `FunctionReturn` to the
/// response queue named in the request, tagged with the call id.
pub const QUEUE_HANDLER: &str = "index.queueTrampoline";

/// Runtime the function is created with unless overridden.
pub const DEFAULT_RUNTIME: &str = "nodejs18.x";

/// A deployable archive produced from a user module.
#[derive(Debug, Clone)]
pub struct PackagedModule {
    /// The zip archive bytes shipped as the function code.
    pub archive: Vec<u8>,
}

/// Produces a deployable archive from a function module.
#[async_trait]
pub trait Packager: Send + Sync {
    /// Bundle `module` and the trampoline into a deployable archive.
    async fn pack(&self, module: &Path) -> Result<PackagedModule>;
}
