// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The provider contract and its AWS implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cloudify_protocol::FunctionCall;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cleanup;
use crate::collector;
use crate::config::{AwsOptions, RolePolicy};
use crate::dispatch;
use crate::error::Result;
use crate::iam::CACHED_EXECUTION_ROLE;
use crate::manifest::AwsResources;
use crate::packager::Packager;
use crate::pending::PendingCalls;
use crate::provision;
use crate::services::AwsServices;
use crate::types::Invocation;

/// The abstract provider contract.
///
/// This is the seam a local in-process executor would implement as well:
/// everything above it sees only initialize / invoke / cleanup plus the
/// serialized-manifest escape hatch for teardown without live state.
#[async_trait]
pub trait CloudProvider {
    /// Provider-specific options accepted by `initialize`.
    type Options: Send;
    /// Live instance state between `initialize` and `cleanup`.
    type State: Send;

    /// Ship the module, stand up every supporting resource, and return the
    /// live state. On any failure partway through, partial state is torn
    /// down before the error propagates.
    async fn initialize(&self, module: &Path, options: Self::Options) -> Result<Self::State>;

    /// Run one call. Remote failures surface through the result's `error`
    /// field; only transport and cancellation failures are returned as
    /// errors.
    async fn invoke(
        &self,
        state: &Self::State,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Invocation>;

    /// Stop background loops and delete every resource the instance owns.
    /// Idempotent; tolerates any subset of resources being absent.
    async fn cleanup(&self, state: &mut Self::State) -> Result<()>;

    /// The JSON-encoded resource manifest, suitable for
    /// [`cleanup_resources`](CloudProvider::cleanup_resources).
    fn resource_list(&self, state: &Self::State) -> Result<String>;

    /// Tear down from a serialized manifest, with no live state.
    async fn cleanup_resources(&self, manifest: &str) -> Result<()>;
}

/// Live state of one AWS instance. Exists between `initialize` and the
/// completion of `cleanup`.
pub struct AwsState {
    pub(crate) services: AwsServices,
    pub(crate) resources: AwsResources,
    pub(crate) pending: Arc<PendingCalls>,
    pub(crate) collector: Mutex<Option<JoinHandle<()>>>,
    pub(crate) dlq_drain: Mutex<Option<JoinHandle<()>>>,
    pub(crate) cleaned: bool,
}

/// Derive the manifest skeleton for a fresh instance. The manifest is
/// allowed to be a superset of what exists, so the always-created names are
/// filled in up front and the queue-mode fields stay empty until created.
pub(crate) fn derive_resources(options: &AwsOptions, nonce: &str, region: &str) -> AwsResources {
    let function_name = format!("cloudify-{nonce}");
    let log_group_name = format!("/aws/lambda/{function_name}");
    let role_name = match options.role_policy {
        RolePolicy::Ephemeral => format!("{function_name}-role"),
        RolePolicy::Cached => options
            .role_name
            .clone()
            .unwrap_or_else(|| CACHED_EXECUTION_ROLE.to_string()),
    };

    AwsResources {
        function_name,
        role_name,
        role_policy: options.role_policy,
        log_group_name,
        region: region.to_string(),
        request_topic_arn: None,
        response_queue_url: None,
        dead_letter_queue_url: None,
        subscription_arn: None,
        feedback_role_name: None,
    }
}

impl AwsState {
    /// Derive the instance's resource names from a fresh nonce.
    pub(crate) fn new(services: AwsServices, options: &AwsOptions, nonce: &str) -> Self {
        let resources = derive_resources(options, nonce, services.region());
        Self::from_parts(services, resources)
    }

    /// Rehydrate state around an existing manifest (no live loops).
    pub(crate) fn from_parts(services: AwsServices, resources: AwsResources) -> Self {
        Self {
            services,
            resources,
            pending: Arc::new(PendingCalls::new()),
            collector: Mutex::new(None),
            dlq_drain: Mutex::new(None),
            cleaned: false,
        }
    }

    /// The resource manifest as currently populated.
    pub fn resources(&self) -> &AwsResources {
        &self.resources
    }

    /// Spawn the response collector and record its handle. Called by the
    /// one registrant that [`PendingCalls::register`] elected.
    pub(crate) async fn start_collector(&self) {
        let Some(queue_url) = self.resources.response_queue_url.clone() else {
            return;
        };
        let handle = collector::spawn_response_collector(
            self.services.sqs.clone(),
            queue_url,
            self.pending.clone(),
        );
        *self.collector.lock().await = Some(handle);
    }
}

/// AWS Lambda provider.
///
/// Owns a packager and nothing else; all per-instance state lives in
/// [`AwsState`], so one provider can drive any number of instances.
pub struct AwsProvider {
    packager: Box<dyn Packager>,
}

impl AwsProvider {
    /// Create a provider around the given packager.
    pub fn new(packager: Box<dyn Packager>) -> Self {
        Self { packager }
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    type Options = AwsOptions;
    type State = AwsState;

    #[instrument(skip(self, options), fields(module = %module.display()))]
    async fn initialize(&self, module: &Path, options: AwsOptions) -> Result<AwsState> {
        let packaged = self.packager.pack(module).await?;
        let services = AwsServices::connect(options.region.as_deref()).await;
        let nonce = Uuid::new_v4().to_string();
        let mut state = AwsState::new(services, &options, &nonce);
        info!(
            function = %state.resources.function_name,
            mode = if options.use_queue { "queue" } else { "direct" },
            "initializing instance"
        );

        match provision::provision(&mut state, &options, packaged.archive).await {
            Ok(()) => Ok(state),
            Err(e) => {
                warn!(error = %e, "provisioning failed, tearing down partial state");
                if let Err(cleanup_err) = cleanup::run(&mut state).await {
                    warn!(error = %cleanup_err, "partial-state teardown failed");
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(self, state, args), fields(function = %function_name))]
    async fn invoke(
        &self,
        state: &AwsState,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Invocation> {
        let call = FunctionCall::new(function_name, args);
        match &state.resources.response_queue_url {
            Some(queue_url) => {
                let call = call.with_response_queue(queue_url.clone());
                dispatch::invoke_queue(state, &call).await
            }
            None => dispatch::invoke_direct(state, &call).await,
        }
    }

    #[instrument(skip(self, state), fields(function = %state.resources.function_name))]
    async fn cleanup(&self, state: &mut AwsState) -> Result<()> {
        cleanup::run(state).await
    }

    fn resource_list(&self, state: &AwsState) -> Result<String> {
        state.resources.to_json()
    }

    #[instrument(skip(self, manifest))]
    async fn cleanup_resources(&self, manifest: &str) -> Result<()> {
        let resources = AwsResources::from_json(manifest)?;
        let services = AwsServices::connect(Some(&resources.region)).await;
        let mut state = AwsState::from_parts(services, resources);
        cleanup::run(&mut state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        let options = AwsOptions::default();
        let resources = derive_resources(&options, "abc-123", "us-west-2");

        assert_eq!(resources.function_name, "cloudify-abc-123");
        assert_eq!(resources.log_group_name, "/aws/lambda/cloudify-abc-123");
        assert_eq!(resources.role_name, "cloudify-abc-123-role");
        assert_eq!(resources.role_policy, RolePolicy::Ephemeral);
        assert_eq!(resources.region, "us-west-2");
        assert!(resources.request_topic_arn.is_none());
        assert!(resources.response_queue_url.is_none());
    }

    #[test]
    fn test_cached_role_uses_well_known_name() {
        let options = AwsOptions::default().with_role_policy(RolePolicy::Cached);
        let resources = derive_resources(&options, "abc", "us-west-2");
        assert_eq!(resources.role_name, CACHED_EXECUTION_ROLE);
    }

    #[test]
    fn test_cached_role_name_override() {
        let options = AwsOptions::default()
            .with_role_policy(RolePolicy::Cached)
            .with_role_name("team-role");
        let resources = derive_resources(&options, "abc", "us-west-2");
        assert_eq!(resources.role_name, "team-role");
    }

    #[test]
    fn test_role_name_override_ignored_when_ephemeral() {
        let options = AwsOptions::default().with_role_name("team-role");
        let resources = derive_resources(&options, "abc", "us-west-2");
        assert_eq!(resources.role_name, "cloudify-abc-role");
    }
}
