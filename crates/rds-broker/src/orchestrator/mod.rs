//! Orchestration of multi-step RDS operations
//!
//! Each orchestrator borrows a tenant-scoped [`RdsOperations`] implementation
//! and the [`TenantContext`] for one request. Describe calls discover current
//! state, mutating calls run in a fixed order, and partially created
//! resources are removed again before a classified [`ApiError`] is returned.
//!
//! [`RdsOperations`]: crate::aws::rds::RdsOperations
//! [`ApiError`]: crate::aws::error::ApiError

pub mod context;
pub mod database;
pub mod params;
mod restore;
pub mod snapshot;
pub mod tenant;
pub mod types;

// Re-export core types
pub use context::{CallContext, compensate};
pub use database::DatabaseOrchestrator;
pub use params::{ParameterGroupKind, ParameterGroupResolver};
pub use snapshot::SnapshotOrchestrator;
pub use tenant::{ProvisioningDefaults, TenantContext};
pub use types::{
    ClusterModifySpec, ClusterSpec, DatabaseCreateRequest, DatabaseList, DatabaseModifyRequest,
    DatabaseResponse, DatabaseStateRequest, InstanceModifySpec, InstanceSpec,
    SnapshotCreateRequest, SnapshotList, SnapshotModifyRequest, SnapshotResponse,
};

use crate::aws::error::{ApiError, ProviderError};
use std::future::Future;

/// Provider code for a missing cluster
pub(crate) const CLUSTER_NOT_FOUND: &str = "DBClusterNotFoundFault";

/// Run a discovery describe, treating not-found as `None`.
///
/// Any other failure is classified with `context` as its message prefix.
pub(crate) async fn probe<T, F>(
    ctx: &CallContext,
    context: &str,
    call: F,
) -> Result<Option<T>, ApiError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match ctx.run(call).await {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(ApiError::from_provider(context, e)),
    }
}

/// Borrow a required, non-empty request field
pub(crate) fn required<'r>(value: Option<&'r str>, field: &str) -> Result<&'r str, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}
