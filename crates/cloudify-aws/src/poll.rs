// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded poll-until-success for eventually consistent AWS operations.
//!
//! A freshly created role is not immediately assumable, and a fresh topic
//! will not immediately accept an attribute referring to a just-created
//! role. Any provider error during the window counts as "not ready yet".

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{ProviderError, Result};

/// Timing knobs for a readiness poll.
#[derive(Debug, Clone)]
pub(crate) struct PollSettings {
    /// Initial settle delay before the first attempt.
    pub settle: Duration,
    /// Maximum number of attempts before giving up.
    pub attempts: u32,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            attempts: 100,
            interval: Duration::from_secs(1),
        }
    }
}

/// Run `op` until it succeeds, treating every error as retryable.
///
/// Exhaustion surfaces [`ProviderError::ProvisioningTimeout`]; the last
/// error is logged, not returned, because after a hundred identical
/// consistency errors the operation name is the useful part.
pub(crate) async fn until_ready<T, E, F, Fut>(
    operation: &str,
    settings: &PollSettings,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    tokio::time::sleep(settings.settle).await;

    for attempt in 1..=settings.attempts {
        match op().await {
            Ok(value) => {
                debug!(operation, attempt, "ready");
                return Ok(value);
            }
            Err(e) => {
                debug!(operation, attempt, error = %e, "not ready yet");
            }
        }
        tokio::time::sleep(settings.interval).await;
    }

    Err(ProviderError::ProvisioningTimeout {
        operation: operation.to_string(),
        attempts: settings.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant() -> PollSettings {
        PollSettings {
            settle: Duration::ZERO,
            attempts: 5,
            interval: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let result = until_ready("op", &instant(), || async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = until_ready("op", &instant(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err("not yet".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_is_timeout() {
        let result: Result<()> =
            until_ready("create function", &instant(), || async {
                Err::<(), _>("still broken".to_string())
            })
            .await;

        match result.unwrap_err() {
            ProviderError::ProvisioningTimeout {
                operation,
                attempts,
            } => {
                assert_eq!(operation, "create function");
                assert_eq!(attempts, 5);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
