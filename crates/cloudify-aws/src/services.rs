// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared AWS SDK client handles.

use aws_config::Region;
use tracing::debug;

/// Fallback region when neither the options nor the ambient configuration
/// name one.
pub const DEFAULT_REGION: &str = "us-west-2";

/// The SDK clients one provider instance works with.
///
/// Clients are cheap handles over a shared connection pool; cloning this
/// struct clones the handles, not the pool.
#[derive(Clone)]
pub struct AwsServices {
    pub(crate) lambda: aws_sdk_lambda::Client,
    pub(crate) iam: aws_sdk_iam::Client,
    pub(crate) logs: aws_sdk_cloudwatchlogs::Client,
    pub(crate) sqs: aws_sdk_sqs::Client,
    pub(crate) sns: aws_sdk_sns::Client,
    pub(crate) region: String,
}

impl AwsServices {
    /// Build clients from ambient credentials, optionally overriding the
    /// region. Credentials come from the standard resolution chain.
    pub async fn connect(region: Option<&str>) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        debug!(region = %region, "AWS clients ready");

        Self {
            lambda: aws_sdk_lambda::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
            logs: aws_sdk_cloudwatchlogs::Client::new(&config),
            sqs: aws_sdk_sqs::Client::new(&config),
            sns: aws_sdk_sns::Client::new(&config),
            region,
        }
    }

    /// The region every client targets.
    pub fn region(&self) -> &str {
        &self.region
    }
}
