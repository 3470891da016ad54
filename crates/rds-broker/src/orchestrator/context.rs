//! Per-call cancellation and deadlines
//!
//! Every provider step of an orchestration is raced against the caller's
//! [`CallContext`]. Compensating actions are not: they run under their own
//! short timeout so a cancelled request still cleans up after itself.

use crate::aws::error::ProviderError;
use rds_broker_common::defaults::COMPENSATION_TIMEOUT_SECS;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const CANCELLED_MESSAGE: &str = "request cancelled";
pub const DEADLINE_EXCEEDED_MESSAGE: &str = "request deadline exceeded";

/// Cancellation token and optional deadline for one orchestration call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the token has fired or the deadline has passed
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Await a provider call unless the context is cancelled or expires first.
    ///
    /// Cancellation wins ties so no new step starts once the token fires.
    pub async fn run<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::local(CANCELLED_MESSAGE)),
            _ = deadline => Err(ProviderError::local(DEADLINE_EXCEEDED_MESSAGE)),
            result = call => result,
        }
    }
}

/// Run a compensating action to completion under its own timeout.
///
/// Returns whether it succeeded. Failures are logged and never propagated.
pub async fn compensate<T, F>(action: &str, resource: &str, call: F) -> bool
where
    F: Future<Output = Result<T, ProviderError>>,
{
    let timeout = Duration::from_secs(COMPENSATION_TIMEOUT_SECS);
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(_)) => {
            info!(action, resource, "Compensating action requested");
            true
        }
        Ok(Err(e)) => {
            error!(action, resource, error = %e, "Compensating action failed");
            false
        }
        Err(_) => {
            error!(
                action,
                resource,
                timeout_secs = COMPENSATION_TIMEOUT_SECS,
                "Compensating action timed out"
            );
            false
        }
    }
}
