//! Manual snapshots of clusters and instances

use super::context::CallContext;
use super::tenant::TenantContext;
use super::types::{SnapshotCreateRequest, SnapshotList, SnapshotModifyRequest, SnapshotResponse};
use super::{CLUSTER_NOT_FOUND, probe, required};
use crate::aws::error::ApiError;
use crate::aws::rds::{
    ClusterSnapshot, CreateSnapshotInput, EngineVersion, InstanceSnapshot, RdsOperations,
    SnapshotQuery,
};
use rds_broker_common::defaults::PROTECTED_SNAPSHOT_MARKER;
use tracing::{debug, info, instrument, warn};

/// The cluster snapshot named `id`, if any.
///
/// More than one match means the provider broke its own uniqueness rule and
/// is reported as an internal error.
pub(crate) async fn find_cluster_snapshot<R: RdsOperations>(
    rds: &R,
    ctx: &CallContext,
    id: &str,
) -> Result<Option<ClusterSnapshot>, ApiError> {
    let found = probe(
        ctx,
        "failed to describe database cluster snapshot",
        rds.describe_cluster_snapshots(&SnapshotQuery::ById(id.to_string())),
    )
    .await?
    .unwrap_or_default();
    exactly_one(found, id)
}

/// The instance snapshot named `id`, if any
pub(crate) async fn find_instance_snapshot<R: RdsOperations>(
    rds: &R,
    ctx: &CallContext,
    id: &str,
) -> Result<Option<InstanceSnapshot>, ApiError> {
    let found = probe(
        ctx,
        "failed to describe database instance snapshot",
        rds.describe_instance_snapshots(&SnapshotQuery::ById(id.to_string())),
    )
    .await?
    .unwrap_or_default();
    exactly_one(found, id)
}

fn exactly_one<T>(mut found: Vec<T>, id: &str) -> Result<Option<T>, ApiError> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        n => Err(ApiError::internal(format!(
            "unexpected number of snapshots found for {id}: {n}"
        ))),
    }
}

/// Snapshot operations for one tenant request
pub struct SnapshotOrchestrator<'a, R> {
    rds: &'a R,
    tenant: &'a TenantContext,
}

impl<'a, R: RdsOperations> SnapshotOrchestrator<'a, R> {
    pub fn new(rds: &'a R, tenant: &'a TenantContext) -> Self {
        Self { rds, tenant }
    }

    /// Snapshot the cluster `db`, or the instance `db` when no such cluster exists.
    #[instrument(skip_all, fields(org = %self.tenant.org, db = %db))]
    pub async fn create(
        &self,
        ctx: &CallContext,
        db: &str,
        request: &SnapshotCreateRequest,
    ) -> Result<SnapshotResponse, ApiError> {
        required(Some(db), "database identifier")?;
        let snapshot_id = required(Some(request.snapshot_identifier.as_str()), "SnapshotIdentifier")?;

        let input = CreateSnapshotInput {
            source_identifier: db.to_string(),
            snapshot_identifier: snapshot_id.to_string(),
            tags: self.tenant.normalize_tags(&[]),
        };

        match ctx.run(self.rds.create_cluster_snapshot(&input)).await {
            Ok(snapshot) => {
                info!(snapshot_id, cluster_id = %db, "Creating database cluster snapshot");
                return Ok(SnapshotResponse {
                    cluster_snapshot: Some(snapshot),
                    instance_snapshot: None,
                });
            }
            Err(e) if e.has_code(CLUSTER_NOT_FOUND) => {
                debug!(db, "No matching cluster, snapshotting instance");
            }
            Err(e) => {
                return Err(ApiError::from_provider(
                    "failed to create database cluster snapshot",
                    e,
                ));
            }
        }

        match ctx.run(self.rds.create_instance_snapshot(&input)).await {
            Ok(snapshot) => {
                info!(snapshot_id, instance_id = %db, "Creating database instance snapshot");
                Ok(SnapshotResponse {
                    cluster_snapshot: None,
                    instance_snapshot: Some(snapshot),
                })
            }
            Err(e) if e.is_not_found() => {
                Err(ApiError::not_found(format!("database {db} not found")))
            }
            Err(e) => Err(ApiError::from_provider(
                "failed to create database instance snapshot",
                e,
            )),
        }
    }

    /// Every snapshot taken of the cluster or instance `db`
    pub async fn list(&self, ctx: &CallContext, db: &str) -> Result<SnapshotList, ApiError> {
        required(Some(db), "database identifier")?;
        let query = SnapshotQuery::OfSource(db.to_string());

        let clusters = ctx
            .run(self.rds.describe_cluster_snapshots(&query))
            .await
            .map_err(|e| ApiError::from_provider("failed to list database cluster snapshots", e))?;
        let instances = ctx
            .run(self.rds.describe_instance_snapshots(&query))
            .await
            .map_err(|e| {
                ApiError::from_provider("failed to list database instance snapshots", e)
            })?;

        let list = SnapshotList::new(clusters, instances);
        debug!(db, items = list.items, "Listed snapshots");
        Ok(list)
    }

    /// The snapshot named `id` in either namespace
    pub async fn get(&self, ctx: &CallContext, id: &str) -> Result<SnapshotResponse, ApiError> {
        required(Some(id), "snapshot identifier")?;

        let response = SnapshotResponse {
            cluster_snapshot: find_cluster_snapshot(self.rds, ctx, id).await?,
            instance_snapshot: find_instance_snapshot(self.rds, ctx, id).await?,
        };
        if response.is_empty() {
            return Err(ApiError::not_found(format!("snapshot {id} not found")));
        }
        Ok(response)
    }

    /// Delete the snapshot named `id`, cluster namespace first
    #[instrument(skip_all, fields(org = %self.tenant.org, snapshot = %id))]
    pub async fn delete(&self, ctx: &CallContext, id: &str) -> Result<SnapshotResponse, ApiError> {
        required(Some(id), "snapshot identifier")?;

        match ctx.run(self.rds.delete_cluster_snapshot(id)).await {
            Ok(snapshot) => {
                info!(snapshot_id = %id, "Deleted database cluster snapshot");
                return Ok(SnapshotResponse {
                    cluster_snapshot: Some(snapshot),
                    instance_snapshot: None,
                });
            }
            Err(e) if e.is_not_found() => {
                debug!(snapshot_id = %id, "No matching cluster snapshot, trying instance snapshot");
            }
            Err(e) => {
                return Err(ApiError::from_provider(
                    "failed to delete database cluster snapshot",
                    e,
                ));
            }
        }

        match ctx.run(self.rds.delete_instance_snapshot(id)).await {
            Ok(snapshot) => {
                info!(snapshot_id = %id, "Deleted database instance snapshot");
                Ok(SnapshotResponse {
                    cluster_snapshot: None,
                    instance_snapshot: Some(snapshot),
                })
            }
            Err(e) if e.is_not_found() => {
                Err(ApiError::not_found(format!("snapshot {id} not found")))
            }
            Err(e) => Err(ApiError::from_provider(
                "failed to delete database instance snapshot",
                e,
            )),
        }
    }

    /// Upgrade the engine version recorded in an instance snapshot
    #[instrument(skip_all, fields(org = %self.tenant.org, snapshot = %id))]
    pub async fn modify(
        &self,
        ctx: &CallContext,
        id: &str,
        request: &SnapshotModifyRequest,
    ) -> Result<SnapshotResponse, ApiError> {
        required(Some(id), "snapshot identifier")?;
        let version = required(Some(request.engine_version.as_str()), "EngineVersion")?;

        let snapshot = ctx
            .run(self.rds.modify_instance_snapshot(id, version))
            .await
            .map_err(|e| ApiError::from_provider("failed to modify database snapshot", e))?;
        info!(snapshot_id = %id, engine_version = version, "Modified database snapshot");

        Ok(SnapshotResponse {
            cluster_snapshot: None,
            instance_snapshot: Some(snapshot),
        })
    }

    /// The engine version a snapshot was taken at, with its valid upgrade targets
    pub async fn versions(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> Result<Vec<EngineVersion>, ApiError> {
        required(Some(id), "snapshot identifier")?;

        let (engine, version) = match find_cluster_snapshot(self.rds, ctx, id).await? {
            Some(s) => (s.engine, s.engine_version),
            None => match find_instance_snapshot(self.rds, ctx, id).await? {
                Some(s) => (s.engine, s.engine_version),
                None => return Err(ApiError::not_found(format!("snapshot {id} not found"))),
            },
        };
        let Some(engine) = engine else {
            return Err(ApiError::internal(format!("snapshot {id} has no engine")));
        };

        ctx.run(
            self.rds
                .describe_engine_versions(&engine, version.as_deref()),
        )
        .await
        .map_err(|e| ApiError::from_provider("failed to describe engine versions", e))
    }

    /// Delete every manual snapshot in the account except protected finals.
    ///
    /// Stops at the first failed delete. NotFound when nothing was eligible.
    #[instrument(skip_all, fields(org = %self.tenant.org))]
    pub async fn purge(&self, ctx: &CallContext) -> Result<SnapshotList, ApiError> {
        let clusters = ctx
            .run(self.rds.describe_cluster_snapshots(&SnapshotQuery::AllManual))
            .await
            .map_err(|e| ApiError::from_provider("failed to list database cluster snapshots", e))?;
        let instances = ctx
            .run(self.rds.describe_instance_snapshots(&SnapshotQuery::AllManual))
            .await
            .map_err(|e| {
                ApiError::from_provider("failed to list database instance snapshots", e)
            })?;

        let mut deleted_clusters = Vec::new();
        for snapshot in clusters.iter().filter(|s| !is_protected(&s.snapshot_identifier)) {
            let id = &snapshot.snapshot_identifier;
            let deleted = ctx
                .run(self.rds.delete_cluster_snapshot(id))
                .await
                .map_err(|e| {
                    ApiError::from_provider("failed to delete database cluster snapshot", e)
                })?;
            info!(snapshot_id = %id, "Purged database cluster snapshot");
            deleted_clusters.push(deleted);
        }

        let mut deleted_instances = Vec::new();
        for snapshot in instances.iter().filter(|s| !is_protected(&s.snapshot_identifier)) {
            let id = &snapshot.snapshot_identifier;
            let deleted = ctx
                .run(self.rds.delete_instance_snapshot(id))
                .await
                .map_err(|e| {
                    ApiError::from_provider("failed to delete database instance snapshot", e)
                })?;
            info!(snapshot_id = %id, "Purged database instance snapshot");
            deleted_instances.push(deleted);
        }

        let purged = SnapshotList::new(deleted_clusters, deleted_instances);
        if purged.is_empty() {
            warn!("No snapshots eligible for purge");
            return Err(ApiError::not_found("no snapshots to purge"));
        }
        info!(
            clusters = purged.cluster_snapshots.len(),
            instances = purged.instance_snapshots.len(),
            "Purged snapshots"
        );
        Ok(purged)
    }
}

fn is_protected(id: &str) -> bool {
    id.contains(PROTECTED_SNAPSHOT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::error::ProviderError;
    use crate::orchestrator::tenant::ProvisioningDefaults;
    use crate::testing::{
        FakeRds, RdsCall, fake_arn, seeded_cluster, seeded_cluster_snapshot, seeded_instance,
        seeded_instance_snapshot,
    };
    use rds_broker_common::{ErrorKind, Tag};

    fn tenant() -> TenantContext {
        TenantContext::new("acme", ProvisioningDefaults::default())
    }

    fn create_request(id: &str) -> SnapshotCreateRequest {
        SnapshotCreateRequest {
            snapshot_identifier: id.to_string(),
        }
    }

    #[tokio::test]
    async fn create_prefers_cluster() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "provisioned"));
        let tenant = tenant();

        let response = SnapshotOrchestrator::new(&rds, &tenant)
            .create(&CallContext::default(), "db1", &create_request("snap1"))
            .await
            .unwrap();

        assert!(response.instance_snapshot.is_none());
        assert_eq!(
            response.cluster_snapshot.unwrap().db_cluster_identifier.as_deref(),
            Some("db1")
        );
        assert_eq!(
            rds.tags_for(&fake_arn("cluster-snapshot", "snap1")),
            vec![Tag::new("spinup:org", "acme")]
        );
    }

    #[tokio::test]
    async fn create_falls_back_to_instance() {
        let rds = FakeRds::default().with_instance(seeded_instance("pg1", "postgres"));
        let tenant = tenant();

        let response = SnapshotOrchestrator::new(&rds, &tenant)
            .create(&CallContext::default(), "pg1", &create_request("snap1"))
            .await
            .unwrap();

        assert!(response.cluster_snapshot.is_none());
        assert!(rds.instance_snapshot("snap1").is_some());
        assert_eq!(
            rds.call_names(),
            vec!["create_cluster_snapshot", "create_instance_snapshot"]
        );
    }

    #[tokio::test]
    async fn create_for_unknown_database_is_not_found() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let orchestrator = SnapshotOrchestrator::new(&rds, &tenant);
        let ctx = CallContext::default();

        let err = orchestrator
            .create(&ctx, "nope", &create_request("snap1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "database nope not found");

        let err = orchestrator
            .create(&ctx, "nope", &create_request(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn list_counts_cluster_snapshots_first() {
        let rds = FakeRds::default()
            .with_cluster_snapshot(seeded_cluster_snapshot(
                "c1",
                "db1",
                "aurora-postgresql",
                "13.7",
                "provisioned",
            ))
            .with_instance_snapshot(seeded_instance_snapshot("i1", "db1", "postgres", "14.5"))
            .with_instance_snapshot(seeded_instance_snapshot("i2", "db1", "postgres", "14.5"))
            .with_instance_snapshot(seeded_instance_snapshot("other", "db2", "postgres", "14.5"));
        let tenant = tenant();

        let list = SnapshotOrchestrator::new(&rds, &tenant)
            .list(&CallContext::default(), "db1")
            .await
            .unwrap();
        assert_eq!(list.cluster_snapshots.len(), 1);
        assert_eq!(list.instance_snapshots.len(), 2);
        assert_eq!(list.items, 1);
    }

    #[tokio::test]
    async fn get_and_delete_probe_both_namespaces() {
        let rds = FakeRds::default()
            .with_instance_snapshot(seeded_instance_snapshot("snap1", "pg1", "postgres", "14.5"));
        let tenant = tenant();
        let orchestrator = SnapshotOrchestrator::new(&rds, &tenant);
        let ctx = CallContext::default();

        let found = orchestrator.get(&ctx, "snap1").await.unwrap();
        assert!(found.cluster_snapshot.is_none());
        assert!(found.instance_snapshot.is_some());

        let deleted = orchestrator.delete(&ctx, "snap1").await.unwrap();
        assert_eq!(
            deleted.instance_snapshot.unwrap().status.as_deref(),
            Some("deleted")
        );

        let err = orchestrator.get(&ctx, "snap1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = orchestrator.delete(&ctx, "snap1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn modify_requires_engine_version() {
        let rds = FakeRds::default()
            .with_instance_snapshot(seeded_instance_snapshot("snap1", "pg1", "postgres", "14.5"));
        let tenant = tenant();
        let orchestrator = SnapshotOrchestrator::new(&rds, &tenant);
        let ctx = CallContext::default();

        let err = orchestrator
            .modify(&ctx, "snap1", &SnapshotModifyRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(rds.calls().is_empty());

        let response = orchestrator
            .modify(
                &ctx,
                "snap1",
                &SnapshotModifyRequest {
                    engine_version: "15.3".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            response.instance_snapshot.unwrap().engine_version.as_deref(),
            Some("15.3")
        );
    }

    #[tokio::test]
    async fn versions_include_upgrade_targets() {
        let rds = FakeRds::default()
            .with_instance_snapshot(seeded_instance_snapshot("snap1", "pg1", "postgres", "14.5"));
        let tenant = tenant();

        let versions = SnapshotOrchestrator::new(&rds, &tenant)
            .versions(&CallContext::default(), "snap1")
            .await
            .unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].valid_upgrade_target, vec!["15.3".to_string()]);
    }

    #[tokio::test]
    async fn purge_spares_protected_snapshots() {
        let rds = FakeRds::default()
            .with_cluster_snapshot(seeded_cluster_snapshot(
                "final-spinup-db1",
                "db1",
                "aurora-postgresql",
                "13.7",
                "provisioned",
            ))
            .with_cluster_snapshot(seeded_cluster_snapshot(
                "nightly-db1",
                "db1",
                "aurora-postgresql",
                "13.7",
                "provisioned",
            ))
            .with_instance_snapshot(seeded_instance_snapshot("manual-pg1", "pg1", "postgres", "14.5"));
        let tenant = tenant();

        let purged = SnapshotOrchestrator::new(&rds, &tenant)
            .purge(&CallContext::default())
            .await
            .unwrap();

        assert_eq!(purged.cluster_snapshots.len(), 1);
        assert_eq!(purged.instance_snapshots.len(), 1);
        assert!(rds.cluster_snapshot("final-spinup-db1").is_some());
        assert!(rds.cluster_snapshot("nightly-db1").is_none());
        assert!(rds.instance_snapshot("manual-pg1").is_none());
    }

    #[tokio::test]
    async fn purge_with_nothing_eligible_is_not_found() {
        let rds = FakeRds::default().with_cluster_snapshot(seeded_cluster_snapshot(
            "final-spinup-db1",
            "db1",
            "aurora-postgresql",
            "13.7",
            "provisioned",
        ));
        let tenant = tenant();

        let err = SnapshotOrchestrator::new(&rds, &tenant)
            .purge(&CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(rds.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn purge_stops_at_first_failure() {
        let rds = FakeRds::default()
            .with_instance_snapshot(seeded_instance_snapshot("a", "pg1", "postgres", "14.5"))
            .with_instance_snapshot(seeded_instance_snapshot("b", "pg1", "postgres", "14.5"));
        rds.fail_on(
            "delete_instance_snapshot",
            ProviderError::new("InvalidDBSnapshotState", "snapshot is being created"),
        );
        let tenant = tenant();

        let err = SnapshotOrchestrator::new(&rds, &tenant)
            .purge(&CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(
            rds.mutating_calls(),
            vec![RdsCall::DeleteInstanceSnapshot("a".to_string())]
        );
    }
}
