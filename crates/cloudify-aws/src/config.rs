// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider options for AWS instances.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default managed policy attached to the execution role.
pub const DEFAULT_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AdministratorAccess";

/// Default function execution timeout in seconds. Also used as the queue
/// visibility timeout so in-flight messages are not redelivered mid-call.
pub const DEFAULT_TIMEOUT: u32 = 60;

/// Default function memory in MB.
pub const DEFAULT_MEMORY_SIZE: u32 = 256;

/// How the execution role's lifetime is managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RolePolicy {
    /// Role name derived from the instance nonce; deleted at teardown.
    #[default]
    Ephemeral,
    /// Fixed well-known role name, created on first use, never deleted.
    Cached,
}

impl RolePolicy {
    /// Returns the string representation of the policy mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ephemeral => "ephemeral",
            Self::Cached => "cached",
        }
    }

    /// Parse a policy mode from a string, defaulting to ephemeral.
    pub fn from_str(s: &str) -> Self {
        match s {
            "cached" => Self::Cached,
            _ => Self::Ephemeral,
        }
    }
}

/// Typed overrides merged into the function-creation request, applied after
/// the fields the provider sets itself.
#[derive(Debug, Clone, Default)]
pub struct LambdaOverrides {
    /// Lambda runtime identifier (e.g. `nodejs18.x`).
    pub runtime: Option<String>,
    /// Handler entry point, overriding the trampoline default.
    pub handler: Option<String>,
    /// Function description.
    pub description: Option<String>,
    /// Environment variables for the function.
    pub environment: HashMap<String, String>,
}

/// Options accepted by `initialize`.
///
/// # Example
///
/// ```
/// use cloudify_aws::AwsOptions;
///
/// let options = AwsOptions::default()
///     .with_region("us-west-2")
///     .with_use_queue(true)
///     .with_timeout(120);
/// assert_eq!(options.timeout, 120);
/// ```
#[derive(Debug, Clone)]
pub struct AwsOptions {
    /// Target region for all SDK clients; ambient default region when absent.
    pub region: Option<String>,
    /// Managed policy attached to the execution role
    /// (default: AdministratorAccess).
    pub policy_arn: String,
    /// Execution role lifetime (default: ephemeral).
    pub role_policy: RolePolicy,
    /// Override for the cached role name. Ignored when `role_policy` is
    /// ephemeral.
    pub role_name: Option<String>,
    /// Function execution timeout in seconds (default: 60). The response and
    /// dead-letter queues use the same value as their visibility timeout, so
    /// calls that outrun it may be redelivered.
    pub timeout: u32,
    /// Function memory in MB (default: 256).
    pub memory_size: u32,
    /// If true, dispatch through the request topic and response queue; else
    /// invoke synchronously (default: false).
    pub use_queue: bool,
    /// Passthrough overrides for the function-creation request, applied last.
    pub lambda_overrides: LambdaOverrides,
}

impl Default for AwsOptions {
    fn default() -> Self {
        Self {
            region: None,
            policy_arn: DEFAULT_POLICY_ARN.to_string(),
            role_policy: RolePolicy::Ephemeral,
            role_name: None,
            timeout: DEFAULT_TIMEOUT,
            memory_size: DEFAULT_MEMORY_SIZE,
            use_queue: false,
            lambda_overrides: LambdaOverrides::default(),
        }
    }
}

impl AwsOptions {
    /// Set the target region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the managed policy attached to the execution role.
    pub fn with_policy_arn(mut self, arn: impl Into<String>) -> Self {
        self.policy_arn = arn.into();
        self
    }

    /// Set the execution role lifetime.
    pub fn with_role_policy(mut self, policy: RolePolicy) -> Self {
        self.role_policy = policy;
        self
    }

    /// Override the cached role name. Ignored for ephemeral roles.
    pub fn with_role_name(mut self, name: impl Into<String>) -> Self {
        self.role_name = Some(name.into());
        self
    }

    /// Set the function execution and queue visibility timeout, in seconds.
    ///
    /// The queues use the same value as their visibility timeout, so
    /// queue-mode calls that run longer than this may be redelivered.
    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the function memory in MB.
    pub fn with_memory_size(mut self, mb: u32) -> Self {
        self.memory_size = mb;
        self
    }

    /// Select queue mode (true) or direct mode (false).
    pub fn with_use_queue(mut self, use_queue: bool) -> Self {
        self.use_queue = use_queue;
        self
    }

    /// Set passthrough overrides for the function-creation request.
    pub fn with_lambda_overrides(mut self, overrides: LambdaOverrides) -> Self {
        self.lambda_overrides = overrides;
        self
    }
}
