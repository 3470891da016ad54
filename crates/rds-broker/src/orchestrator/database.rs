//! Database create, modify, delete, power and describe operations

use super::context::{CallContext, compensate};
use super::params::{ParameterGroupKind, ParameterGroupResolver};
use super::tenant::TenantContext;
use super::types::{
    ClusterModifySpec, ClusterSpec, DatabaseCreateRequest, DatabaseList, DatabaseModifyRequest,
    DatabaseResponse, DatabaseStateRequest, InstanceModifySpec, InstanceSpec,
};
use super::{CLUSTER_NOT_FOUND, probe, required};
use crate::aws::error::ApiError;
use crate::aws::rds::{
    CreateClusterInput, CreateInstanceInput, DbCluster, DbInstance, DeleteInput,
    ModifyClusterInput, ModifyInstanceInput, RdsOperations,
};
use rds_broker_common::PowerState;
use rds_broker_common::defaults::final_snapshot_name;
use tracing::{debug, info, instrument, warn};

/// Sequences RDS calls for one tenant request
pub struct DatabaseOrchestrator<'a, R> {
    pub(super) rds: &'a R,
    pub(super) tenant: &'a TenantContext,
}

impl<'a, R: RdsOperations> DatabaseOrchestrator<'a, R> {
    pub fn new(rds: &'a R, tenant: &'a TenantContext) -> Self {
        Self { rds, tenant }
    }

    pub(super) fn params(&self) -> ParameterGroupResolver<'a, R> {
        ParameterGroupResolver::new(self.rds, self.tenant)
    }

    /// Create a cluster, an instance, or a cluster with its first instance.
    ///
    /// Requests naming a snapshot are restores and are handed to
    /// [`DatabaseOrchestrator::restore`]. If the instance cannot be created,
    /// a cluster created by the same call is deleted again before the
    /// instance error is returned.
    #[instrument(skip_all, fields(org = %self.tenant.org))]
    pub async fn create(
        &self,
        ctx: &CallContext,
        request: &DatabaseCreateRequest,
    ) -> Result<DatabaseResponse, ApiError> {
        if request.is_restore() {
            return self.restore(ctx, request).await;
        }
        if request.cluster.is_none() && request.instance.is_none() {
            return Err(ApiError::bad_request("Cluster or Instance must be specified"));
        }

        // Every payload is built before the first mutating call so a bad
        // instance spec cannot leave a cluster behind.
        let cluster_input = match &request.cluster {
            Some(spec) => Some(self.cluster_payload(ctx, spec).await?),
            None => None,
        };
        let instance_input = match &request.instance {
            Some(spec) => Some(self.instance_payload(ctx, spec).await?),
            None => None,
        };

        let mut response = DatabaseResponse::default();

        if let Some(input) = &cluster_input {
            let cluster = ctx
                .run(self.rds.create_cluster(input))
                .await
                .map_err(|e| ApiError::from_provider("failed to create database cluster", e))?;
            info!(
                cluster_id = %cluster.db_cluster_identifier,
                engine = ?cluster.engine,
                "Created database cluster"
            );
            response.cluster = Some(cluster);
        }

        if let Some(input) = &instance_input {
            match ctx.run(self.rds.create_instance(input)).await {
                Ok(instance) => {
                    info!(
                        instance_id = %instance.db_instance_identifier,
                        class = ?instance.db_instance_class,
                        "Created database instance"
                    );
                    response.instance = Some(instance);
                }
                Err(e) => {
                    if let Some(cluster) = &cluster_input {
                        let id = &cluster.db_cluster_identifier;
                        warn!(cluster_id = %id, error = %e, "Instance creation failed, deleting new cluster");
                        compensate(
                            "delete-cluster",
                            id,
                            self.rds.delete_cluster(&DeleteInput::skip_final_snapshot(id)),
                        )
                        .await;
                    }
                    return Err(ApiError::from_provider("failed to create database instance", e));
                }
            }
        }

        Ok(response)
    }

    async fn cluster_payload(
        &self,
        ctx: &CallContext,
        spec: &ClusterSpec,
    ) -> Result<CreateClusterInput, ApiError> {
        let id = required(spec.db_cluster_identifier.as_deref(), "DBClusterIdentifier")?;

        let parameter_group = match &spec.db_cluster_parameter_group_name {
            Some(group) => Some(group.clone()),
            None => {
                self.params()
                    .default_group(
                        ctx,
                        ParameterGroupKind::Cluster,
                        spec.engine.as_deref(),
                        spec.engine_version.as_deref(),
                    )
                    .await?
            }
        };

        Ok(CreateClusterInput {
            db_cluster_identifier: id.to_string(),
            engine: spec.engine.clone(),
            engine_mode: spec.engine_mode.clone(),
            engine_version: spec.engine_version.clone(),
            db_cluster_parameter_group_name: parameter_group,
            db_subnet_group_name: self
                .tenant
                .subnet_group_or_default(spec.db_subnet_group_name.as_deref()),
            master_username: spec.master_username.clone(),
            master_user_password: spec.master_user_password.clone(),
            port: spec.port,
            backup_retention_period: spec.backup_retention_period,
            storage_encrypted: spec.storage_encrypted.unwrap_or(true),
            vpc_security_group_ids: spec.vpc_security_group_ids.clone(),
            enable_cloudwatch_logs_exports: spec.enable_cloudwatch_logs_exports.clone(),
            scaling_configuration: spec.scaling_configuration.clone(),
            tags: self.tenant.normalize_tags(&spec.tags),
        })
    }

    async fn instance_payload(
        &self,
        ctx: &CallContext,
        spec: &InstanceSpec,
    ) -> Result<CreateInstanceInput, ApiError> {
        let id = required(spec.db_instance_identifier.as_deref(), "DBInstanceIdentifier")?;

        let parameter_group = match &spec.db_parameter_group_name {
            Some(group) => Some(group.clone()),
            None => {
                self.params()
                    .default_group(
                        ctx,
                        ParameterGroupKind::Instance,
                        spec.engine.as_deref(),
                        spec.engine_version.as_deref(),
                    )
                    .await?
            }
        };

        // Cluster members inherit encryption from their cluster
        let storage_encrypted = match spec.db_cluster_identifier {
            Some(_) => spec.storage_encrypted,
            None => Some(spec.storage_encrypted.unwrap_or(true)),
        };

        Ok(CreateInstanceInput {
            db_instance_identifier: id.to_string(),
            db_instance_class: spec.db_instance_class.clone(),
            db_cluster_identifier: spec.db_cluster_identifier.clone(),
            engine: spec.engine.clone(),
            engine_version: spec.engine_version.clone(),
            allocated_storage: spec.allocated_storage,
            backup_retention_period: spec.backup_retention_period,
            db_parameter_group_name: parameter_group,
            db_subnet_group_name: self
                .tenant
                .subnet_group_or_default(spec.db_subnet_group_name.as_deref()),
            license_model: spec.license_model.clone(),
            master_username: spec.master_username.clone(),
            master_user_password: spec.master_user_password.clone(),
            multi_az: spec.multi_az,
            port: spec.port,
            storage_encrypted,
            vpc_security_group_ids: spec.vpc_security_group_ids.clone(),
            enable_cloudwatch_logs_exports: spec.enable_cloudwatch_logs_exports.clone(),
            tags: self.tenant.normalize_tags(&spec.tags),
        })
    }

    /// Modify the cluster or the instance named `id`, and/or its tags.
    #[instrument(skip_all, fields(org = %self.tenant.org, db = %id))]
    pub async fn modify(
        &self,
        ctx: &CallContext,
        id: &str,
        request: &DatabaseModifyRequest,
    ) -> Result<DatabaseResponse, ApiError> {
        required(Some(id), "database identifier")?;
        if request.cluster.is_some() && request.instance.is_some() {
            return Err(ApiError::bad_request(
                "cannot specify both Cluster and Instance",
            ));
        }
        if request.cluster.is_none() && request.instance.is_none() && request.tags.is_none() {
            return Err(ApiError::bad_request(
                "Cluster, Instance or Tags must be specified",
            ));
        }

        let mut response = DatabaseResponse::default();

        if let Some(spec) = &request.cluster {
            let input = self.modify_cluster_payload(ctx, id, spec).await?;
            let cluster = ctx
                .run(self.rds.modify_cluster(&input))
                .await
                .map_err(|e| ApiError::from_provider("failed to modify database cluster", e))?;
            info!(cluster_id = %id, "Modified database cluster");
            response.cluster = Some(cluster);
        }

        if let Some(spec) = &request.instance {
            let input = self.modify_instance_payload(ctx, id, spec).await?;
            let instance = ctx
                .run(self.rds.modify_instance(&input))
                .await
                .map_err(|e| ApiError::from_provider("failed to modify database instance", e))?;
            info!(instance_id = %id, "Modified database instance");
            response.instance = Some(instance);
        }

        if let Some(tags) = &request.tags {
            let arns = self.resolve_arn(ctx, id).await?;
            let tags = self.tenant.normalize_tags(tags);
            for arn in &arns {
                ctx.run(self.rds.add_tags(arn, &tags))
                    .await
                    .map_err(|e| ApiError::from_provider("failed to add tags to database", e))?;
                info!(%arn, count = tags.len(), "Updated tags");
            }
        }

        Ok(response)
    }

    async fn modify_cluster_payload(
        &self,
        ctx: &CallContext,
        id: &str,
        spec: &ClusterModifySpec,
    ) -> Result<ModifyClusterInput, ApiError> {
        let mut parameter_group = spec.db_cluster_parameter_group_name.clone();
        if parameter_group.is_none() {
            if let Some(version) = &spec.engine_version {
                let existing = ctx
                    .run(self.rds.describe_cluster(id))
                    .await
                    .map_err(|e| ApiError::from_provider("failed to describe database cluster", e))?;
                parameter_group = self
                    .params()
                    .default_group(
                        ctx,
                        ParameterGroupKind::Cluster,
                        existing.engine.as_deref(),
                        Some(version),
                    )
                    .await?;
            }
        }

        Ok(ModifyClusterInput {
            db_cluster_identifier: id.to_string(),
            engine_version: spec.engine_version.clone(),
            db_cluster_parameter_group_name: parameter_group,
            allow_major_version_upgrade: spec.allow_major_version_upgrade,
            apply_immediately: spec.apply_immediately,
            backup_retention_period: spec.backup_retention_period,
            master_user_password: spec.master_user_password.clone(),
            port: spec.port,
            vpc_security_group_ids: spec.vpc_security_group_ids.clone(),
            scaling_configuration: spec.scaling_configuration.clone(),
        })
    }

    async fn modify_instance_payload(
        &self,
        ctx: &CallContext,
        id: &str,
        spec: &InstanceModifySpec,
    ) -> Result<ModifyInstanceInput, ApiError> {
        let mut parameter_group = spec.db_parameter_group_name.clone();
        if parameter_group.is_none() {
            if let Some(version) = &spec.engine_version {
                let existing = ctx
                    .run(self.rds.describe_instance(id))
                    .await
                    .map_err(|e| {
                        ApiError::from_provider("failed to describe database instance", e)
                    })?;
                parameter_group = self
                    .params()
                    .default_group(
                        ctx,
                        ParameterGroupKind::Instance,
                        existing.engine.as_deref(),
                        Some(version),
                    )
                    .await?;
            }
        }

        Ok(ModifyInstanceInput {
            db_instance_identifier: id.to_string(),
            db_instance_class: spec.db_instance_class.clone(),
            engine_version: spec.engine_version.clone(),
            db_parameter_group_name: parameter_group,
            allocated_storage: spec.allocated_storage,
            allow_major_version_upgrade: spec.allow_major_version_upgrade,
            apply_immediately: spec.apply_immediately,
            backup_retention_period: spec.backup_retention_period,
            master_user_password: spec.master_user_password.clone(),
            multi_az: spec.multi_az,
            vpc_security_group_ids: spec.vpc_security_group_ids.clone(),
        })
    }

    /// ARNs of the cluster and/or instance named `id`.
    ///
    /// A name may match both a cluster and an instance; both ARNs are
    /// returned. NotFound when it matches neither.
    #[instrument(skip_all, fields(db = %id))]
    pub async fn resolve_arn(&self, ctx: &CallContext, id: &str) -> Result<Vec<String>, ApiError> {
        let cluster = probe(
            ctx,
            "failed to describe database cluster",
            self.rds.describe_cluster(id),
        )
        .await?;
        let instance = probe(
            ctx,
            "failed to describe database instance",
            self.rds.describe_instance(id),
        )
        .await?;

        let arns: Vec<String> = cluster
            .and_then(|c| c.db_cluster_arn)
            .into_iter()
            .chain(instance.and_then(|i| i.db_instance_arn))
            .collect();

        if arns.is_empty() {
            return Err(ApiError::not_found(format!(
                "unable to determine ARN for database {id}"
            )));
        }
        debug!(?arns, "Resolved database ARNs");
        Ok(arns)
    }

    /// Delete the instance `id` (and its cluster once empty), or the cluster
    /// `id` when no such instance exists.
    ///
    /// Final snapshots are named `final-<identifier>`. Nothing to delete is
    /// not an error: the response is simply empty.
    #[instrument(skip_all, fields(org = %self.tenant.org, db = %id, snapshot = with_snapshot))]
    pub async fn delete(
        &self,
        ctx: &CallContext,
        id: &str,
        with_snapshot: bool,
    ) -> Result<DatabaseResponse, ApiError> {
        required(Some(id), "database identifier")?;
        let mut response = DatabaseResponse::default();

        let found = probe(
            ctx,
            "failed to describe database instance",
            self.rds.describe_instance(id),
        )
        .await?;

        match found {
            Some(instance) => {
                let parent = instance.db_cluster_identifier.clone();
                let input = if with_snapshot && parent.is_none() {
                    info!(instance_id = %id, "Deleting database instance with final snapshot");
                    DeleteInput::with_final_snapshot(id, final_snapshot_name(id))
                } else {
                    info!(instance_id = %id, "Deleting database instance without final snapshot");
                    DeleteInput::skip_final_snapshot(id)
                };

                let deleted = ctx
                    .run(self.rds.delete_instance(&input))
                    .await
                    .map_err(|e| ApiError::from_provider("failed to delete database instance", e))?;
                response.instance = Some(deleted);

                if let Some(cluster_id) = parent {
                    response.cluster = self
                        .delete_parent_cluster(ctx, &cluster_id, with_snapshot)
                        .await;
                }
            }
            None => {
                info!(db = %id, "No matching database instance, deleting as cluster");
                let input = cluster_delete_input(id, with_snapshot);
                match ctx.run(self.rds.delete_cluster(&input)).await {
                    Ok(cluster) => {
                        info!(cluster_id = %id, "Requested deletion of database cluster");
                        response.cluster = Some(cluster);
                    }
                    Err(e) if e.is_not_found() => {
                        info!(cluster_id = %id, error = %e, "No matching database cluster");
                    }
                    Err(e) => {
                        return Err(ApiError::from_provider("failed to delete database cluster", e));
                    }
                }
            }
        }

        if response.is_empty() {
            info!(db = %id, "Nothing to delete");
        }
        Ok(response)
    }

    /// Best-effort delete of the cluster a deleted instance belonged to.
    ///
    /// Fails whenever other members remain, which is expected and only logged.
    async fn delete_parent_cluster(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        with_snapshot: bool,
    ) -> Option<DbCluster> {
        let input = cluster_delete_input(cluster_id, with_snapshot);
        match ctx.run(self.rds.delete_cluster(&input)).await {
            Ok(cluster) => {
                info!(cluster_id, "Requested deletion of now empty database cluster");
                Some(cluster)
            }
            Err(e) => {
                warn!(cluster_id, error = %e, "Associated database cluster not deleted");
                None
            }
        }
    }

    /// Start or stop the cluster `id`, or the instance `id` when there is no
    /// such cluster.
    #[instrument(skip_all, fields(org = %self.tenant.org, db = %id, state = %state))]
    pub async fn set_power_state(
        &self,
        ctx: &CallContext,
        id: &str,
        state: PowerState,
    ) -> Result<DatabaseResponse, ApiError> {
        required(Some(id), "database identifier")?;

        let cluster = match state {
            PowerState::Start => ctx.run(self.rds.start_cluster(id)).await,
            PowerState::Stop => ctx.run(self.rds.stop_cluster(id)).await,
        };
        match cluster {
            Ok(cluster) => {
                info!(cluster_id = %id, "Requested database cluster power change");
                return Ok(DatabaseResponse {
                    cluster: Some(cluster),
                    instance: None,
                });
            }
            Err(e) if e.has_code(CLUSTER_NOT_FOUND) => {
                debug!(db = %id, "No matching cluster, trying instance");
            }
            Err(e) => {
                return Err(ApiError::from_provider(
                    &format!("failed to {state} database cluster"),
                    e,
                ));
            }
        }

        let instance = match state {
            PowerState::Start => ctx.run(self.rds.start_instance(id)).await,
            PowerState::Stop => ctx.run(self.rds.stop_instance(id)).await,
        }
        .map_err(|e| ApiError::from_provider(&format!("failed to {state} database instance"), e))?;
        info!(instance_id = %id, "Requested database instance power change");

        Ok(DatabaseResponse {
            cluster: None,
            instance: Some(instance),
        })
    }

    /// Parse a caller-supplied state and apply it
    pub async fn set_state(
        &self,
        ctx: &CallContext,
        id: &str,
        request: &DatabaseStateRequest,
    ) -> Result<DatabaseResponse, ApiError> {
        let state = PowerState::parse(&request.state)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        self.set_power_state(ctx, id, state).await
    }

    /// The instance named `id` and, when `all`, the cluster of that name.
    pub async fn get(
        &self,
        ctx: &CallContext,
        id: &str,
        all: bool,
    ) -> Result<DatabaseResponse, ApiError> {
        required(Some(id), "database identifier")?;

        let cluster = if all {
            probe(
                ctx,
                "failed to describe database cluster",
                self.rds.describe_cluster(id),
            )
            .await?
        } else {
            None
        };
        let instance: Option<DbInstance> = probe(
            ctx,
            "failed to describe database instance",
            self.rds.describe_instance(id),
        )
        .await?;

        let response = DatabaseResponse { cluster, instance };
        if response.is_empty() {
            return Err(ApiError::not_found(format!("database {id} not found")));
        }
        Ok(response)
    }

    /// Every instance in the account and, when `all`, every cluster.
    pub async fn list(&self, ctx: &CallContext, all: bool) -> Result<DatabaseList, ApiError> {
        let clusters = if all {
            Some(
                ctx.run(self.rds.describe_clusters())
                    .await
                    .map_err(|e| ApiError::from_provider("failed to list database clusters", e))?,
            )
        } else {
            None
        };
        let instances = ctx
            .run(self.rds.describe_instances())
            .await
            .map_err(|e| ApiError::from_provider("failed to list database instances", e))?;

        Ok(DatabaseList {
            clusters,
            instances,
        })
    }
}

fn cluster_delete_input(id: &str, with_snapshot: bool) -> DeleteInput {
    if with_snapshot {
        DeleteInput::with_final_snapshot(id, final_snapshot_name(id))
    } else {
        DeleteInput::skip_final_snapshot(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::error::ProviderError;
    use crate::orchestrator::tenant::ProvisioningDefaults;
    use crate::testing::{FakeRds, RdsCall, fake_arn, seeded_cluster, seeded_instance};
    use rds_broker_common::{ErrorKind, Tag};

    fn tenant() -> TenantContext {
        TenantContext::new(
            "acme",
            ProvisioningDefaults {
                subnet_group: Some("acme-subnets".to_string()),
                db_parameter_groups: [("postgres14".to_string(), "acme-pg14".to_string())].into(),
                cluster_parameter_groups: [(
                    "aurora-postgresql11".to_string(),
                    "acme-aurora-pg11".to_string(),
                )]
                .into(),
            },
        )
    }

    fn member(id: &str, cluster: &str) -> DbInstance {
        DbInstance {
            db_cluster_identifier: Some(cluster.to_string()),
            ..seeded_instance(id, "aurora-postgresql")
        }
    }

    fn cluster_and_instance() -> DatabaseCreateRequest {
        DatabaseCreateRequest {
            cluster: Some(ClusterSpec {
                db_cluster_identifier: Some("db1".to_string()),
                engine: Some("aurora-postgresql".to_string()),
                tags: vec![Tag::new("spinup:org", "spoofed")],
                ..Default::default()
            }),
            instance: Some(InstanceSpec {
                db_instance_identifier: Some("db1-1".to_string()),
                db_cluster_identifier: Some("db1".to_string()),
                db_instance_class: Some("db.r5.large".to_string()),
                engine: Some("aurora-postgresql".to_string()),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_to_payloads() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let orchestrator = DatabaseOrchestrator::new(&rds, &tenant);
        let request = cluster_and_instance();

        let response = orchestrator
            .create(&CallContext::default(), &request)
            .await
            .unwrap();
        assert_eq!(response.cluster.unwrap().db_cluster_identifier, "db1");
        assert_eq!(response.instance.unwrap().db_instance_identifier, "db1-1");

        let calls = rds.mutating_calls();
        let RdsCall::CreateCluster(cluster) = &calls[0] else {
            panic!("expected create_cluster first, got {calls:?}");
        };
        assert!(cluster.storage_encrypted);
        assert_eq!(cluster.db_subnet_group_name.as_deref(), Some("acme-subnets"));
        assert_eq!(
            cluster.db_cluster_parameter_group_name.as_deref(),
            Some("acme-aurora-pg11")
        );
        assert_eq!(cluster.tags, vec![Tag::new("spinup:org", "acme")]);

        let RdsCall::CreateInstance(instance) = &calls[1] else {
            panic!("expected create_instance second, got {calls:?}");
        };
        assert_eq!(instance.storage_encrypted, None);
        assert_eq!(instance.db_cluster_identifier.as_deref(), Some("db1"));

        // The caller's request is left as it was
        assert_eq!(request, cluster_and_instance());
    }

    #[tokio::test]
    async fn standalone_instance_is_encrypted_by_default() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let request = DatabaseCreateRequest {
            instance: Some(InstanceSpec {
                db_instance_identifier: Some("pg1".to_string()),
                engine: Some("postgres".to_string()),
                engine_version: Some("14.5".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        DatabaseOrchestrator::new(&rds, &tenant)
            .create(&CallContext::default(), &request)
            .await
            .unwrap();

        let calls = rds.mutating_calls();
        let RdsCall::CreateInstance(input) = &calls[0] else {
            panic!("expected create_instance, got {calls:?}");
        };
        assert_eq!(input.storage_encrypted, Some(true));
        assert_eq!(input.db_parameter_group_name.as_deref(), Some("acme-pg14"));
    }

    #[tokio::test]
    async fn failed_instance_rolls_back_cluster() {
        let rds = FakeRds::default();
        rds.fail_on(
            "create_instance",
            ProviderError::new(
                "InsufficientDBInstanceCapacity",
                "Cannot create a database instance because there are no available instances",
            ),
        );
        let tenant = tenant();

        let err = DatabaseOrchestrator::new(&rds, &tenant)
            .create(&CallContext::default(), &cluster_and_instance())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert!(err.message().starts_with("failed to create database instance"));
        assert!(rds.cluster("db1").is_none());
        assert_eq!(
            rds.call_names()
                .into_iter()
                .filter(|n| *n == "delete_cluster")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn failed_rollback_keeps_original_error() {
        let rds = FakeRds::default();
        rds.fail_on(
            "create_instance",
            ProviderError::new("DBInstanceAlreadyExists", "exists"),
        );
        rds.fail_on(
            "delete_cluster",
            ProviderError::new("InvalidDBClusterStateFault", "creating"),
        );
        let tenant = tenant();

        let err = DatabaseOrchestrator::new(&rds, &tenant)
            .create(&CallContext::default(), &cluster_and_instance())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.provider().unwrap().has_code("DBInstanceAlreadyExists"));
    }

    #[tokio::test]
    async fn invalid_instance_spec_creates_nothing() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let mut request = cluster_and_instance();
        if let Some(instance) = request.instance.as_mut() {
            instance.db_instance_identifier = None;
        }

        let err = DatabaseOrchestrator::new(&rds, &tenant)
            .create(&CallContext::default(), &request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(rds.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn empty_create_is_bad_request() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let err = DatabaseOrchestrator::new(&rds, &tenant)
            .create(&CallContext::default(), &DatabaseCreateRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn modify_rejects_cluster_and_instance() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let request = DatabaseModifyRequest {
            cluster: Some(ClusterModifySpec::default()),
            instance: Some(InstanceModifySpec::default()),
            tags: Some(vec![Tag::new("app", "x")]),
        };

        let err = DatabaseOrchestrator::new(&rds, &tenant)
            .modify(&CallContext::default(), "db1", &request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(rds.calls().is_empty());
    }

    #[tokio::test]
    async fn modify_upgrade_resolves_parameter_group_from_existing_engine() {
        let rds = FakeRds::default().with_instance(seeded_instance("pg1", "postgres"));
        let tenant = tenant();
        let request = DatabaseModifyRequest {
            instance: Some(InstanceModifySpec {
                engine_version: Some("14.5".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = DatabaseOrchestrator::new(&rds, &tenant)
            .modify(&CallContext::default(), "pg1", &request)
            .await
            .unwrap();
        assert_eq!(
            response.instance.unwrap().engine_version.as_deref(),
            Some("14.5")
        );

        let calls = rds.mutating_calls();
        let RdsCall::ModifyInstance(input) = &calls[0] else {
            panic!("expected modify_instance, got {calls:?}");
        };
        assert_eq!(input.db_instance_identifier, "pg1");
        assert_eq!(input.db_parameter_group_name.as_deref(), Some("acme-pg14"));
    }

    #[tokio::test]
    async fn modify_tags_every_matching_resource() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "provisioned"))
            .with_instance(member("db1", "db1"));
        let tenant = tenant();
        let request = DatabaseModifyRequest {
            tags: Some(vec![Tag::new("app", "x"), Tag::new("yale:org", "other")]),
            ..Default::default()
        };

        DatabaseOrchestrator::new(&rds, &tenant)
            .modify(&CallContext::default(), "db1", &request)
            .await
            .unwrap();

        let expected = vec![Tag::new("app", "x"), Tag::new("spinup:org", "acme")];
        assert_eq!(rds.tags_for(&fake_arn("cluster", "db1")), expected);
        assert_eq!(rds.tags_for(&fake_arn("db", "db1")), expected);
    }

    #[tokio::test]
    async fn resolve_arn_of_unknown_database_is_not_found() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let err = DatabaseOrchestrator::new(&rds, &tenant)
            .resolve_arn(&CallContext::default(), "nope")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_standalone_instance_with_final_snapshot() {
        let rds = FakeRds::default().with_instance(seeded_instance("pg1", "postgres"));
        let tenant = tenant();

        let response = DatabaseOrchestrator::new(&rds, &tenant)
            .delete(&CallContext::default(), "pg1", true)
            .await
            .unwrap();

        assert!(response.cluster.is_none());
        assert_eq!(
            rds.mutating_calls(),
            vec![RdsCall::DeleteInstance(DeleteInput::with_final_snapshot(
                "pg1",
                "final-pg1"
            ))]
        );
    }

    #[tokio::test]
    async fn delete_last_member_removes_cluster() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "provisioned"))
            .with_instance(member("db1-1", "db1"));
        let tenant = tenant();

        let response = DatabaseOrchestrator::new(&rds, &tenant)
            .delete(&CallContext::default(), "db1-1", true)
            .await
            .unwrap();

        assert!(response.instance.is_some());
        assert!(response.cluster.is_some());
        assert_eq!(
            rds.mutating_calls(),
            vec![
                RdsCall::DeleteInstance(DeleteInput::skip_final_snapshot("db1-1")),
                RdsCall::DeleteCluster(DeleteInput::with_final_snapshot("db1", "final-db1")),
            ]
        );
    }

    #[tokio::test]
    async fn delete_member_with_siblings_keeps_cluster() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "provisioned"))
            .with_instance(member("db1-1", "db1"))
            .with_instance(member("db1-2", "db1"));
        let tenant = tenant();

        let response = DatabaseOrchestrator::new(&rds, &tenant)
            .delete(&CallContext::default(), "db1-1", false)
            .await
            .unwrap();

        assert!(response.instance.is_some());
        assert!(response.cluster.is_none());
        assert!(rds.cluster("db1").is_some());
    }

    #[tokio::test]
    async fn delete_cluster_failure_is_classified() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "serverless"));
        rds.fail_on(
            "delete_cluster",
            ProviderError::new("InvalidDBClusterStateFault", "cluster is being modified"),
        );
        let tenant = tenant();

        let err = DatabaseOrchestrator::new(&rds, &tenant)
            .delete(&CallContext::default(), "db1", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(
            err.message(),
            "failed to delete database cluster: cluster is being modified"
        );
    }

    #[tokio::test]
    async fn power_falls_back_to_instance() {
        let rds = FakeRds::default().with_instance(seeded_instance("pg1", "postgres"));
        let tenant = tenant();

        let response = DatabaseOrchestrator::new(&rds, &tenant)
            .set_power_state(&CallContext::default(), "pg1", PowerState::Stop)
            .await
            .unwrap();

        assert_eq!(
            response.instance.unwrap().status.as_deref(),
            Some("stopping")
        );
        assert_eq!(rds.call_names(), vec!["stop_cluster", "stop_instance"]);
    }

    #[tokio::test]
    async fn power_prefers_cluster() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "provisioned"));
        let tenant = tenant();

        let response = DatabaseOrchestrator::new(&rds, &tenant)
            .set_power_state(&CallContext::default(), "db1", PowerState::Start)
            .await
            .unwrap();
        assert!(response.cluster.is_some());
        assert_eq!(rds.call_names(), vec!["start_cluster"]);
    }

    #[tokio::test]
    async fn invalid_power_state_is_bad_request() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let orchestrator = DatabaseOrchestrator::new(&rds, &tenant);
        let ctx = CallContext::default();

        let err = orchestrator
            .set_state(
                &ctx,
                "db1",
                &DatabaseStateRequest {
                    state: "reboot".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(
            err.message(),
            "Invalid state. Valid states are 'stop' or 'start'."
        );

        let err = orchestrator
            .set_power_state(&ctx, "", PowerState::Start)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(rds.calls().is_empty());
    }

    #[tokio::test]
    async fn get_reports_not_found_only_when_nothing_matches() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "serverless"));
        let tenant = tenant();
        let orchestrator = DatabaseOrchestrator::new(&rds, &tenant);
        let ctx = CallContext::default();

        let response = orchestrator.get(&ctx, "db1", true).await.unwrap();
        assert!(response.cluster.is_some());
        assert!(response.instance.is_none());

        let err = orchestrator.get(&ctx, "db1", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn list_includes_clusters_only_when_asked() {
        let rds = FakeRds::default()
            .with_cluster(seeded_cluster("db1", "aurora-postgresql", "serverless"))
            .with_instance(seeded_instance("pg1", "postgres"));
        let tenant = tenant();
        let orchestrator = DatabaseOrchestrator::new(&rds, &tenant);
        let ctx = CallContext::default();

        let list = orchestrator.list(&ctx, false).await.unwrap();
        assert_eq!(list.clusters, None);
        assert_eq!(list.instances.len(), 1);

        let list = orchestrator.list(&ctx, true).await.unwrap();
        assert_eq!(list.clusters.map(|c| c.len()), Some(1));
    }
}
