//! Restoring databases from snapshots

use super::context::{CallContext, compensate};
use super::database::DatabaseOrchestrator;
use super::params::ParameterGroupKind;
use super::snapshot::{find_cluster_snapshot, find_instance_snapshot};
use super::types::{ClusterSpec, DatabaseCreateRequest, DatabaseResponse, InstanceSpec};
use super::required;
use crate::aws::error::ApiError;
use crate::aws::rds::{
    CreateInstanceInput, DeleteInput, RdsOperations, RestoreClusterInput, RestoreInstanceInput,
};
use rds_broker_common::defaults::SERVERLESS_ENGINE_MODE;
use tracing::{info, instrument, warn};

fn snapshot_of(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl<'a, R: RdsOperations> DatabaseOrchestrator<'a, R> {
    /// Restore a cluster or a standalone instance from a snapshot.
    ///
    /// Only two shapes are accepted: a Cluster spec naming a cluster snapshot
    /// (with an optional Instance spec for the companion instance), or an
    /// Instance spec alone naming an instance snapshot.
    #[instrument(skip_all, fields(org = %self.tenant.org))]
    pub async fn restore(
        &self,
        ctx: &CallContext,
        request: &DatabaseCreateRequest,
    ) -> Result<DatabaseResponse, ApiError> {
        match (&request.cluster, &request.instance) {
            (Some(cluster), instance)
                if snapshot_of(cluster.snapshot_identifier.as_deref()).is_some() =>
            {
                self.restore_cluster(ctx, cluster, instance.as_ref()).await
            }
            (None, Some(instance))
                if snapshot_of(instance.snapshot_identifier.as_deref()).is_some() =>
            {
                self.restore_instance(ctx, instance).await
            }
            _ => Err(ApiError::bad_request(
                "restore requires a Cluster with SnapshotIdentifier, or an Instance with SnapshotIdentifier and no Cluster",
            )),
        }
    }

    async fn restore_cluster(
        &self,
        ctx: &CallContext,
        spec: &ClusterSpec,
        instance_spec: Option<&InstanceSpec>,
    ) -> Result<DatabaseResponse, ApiError> {
        let snapshot_id = required(spec.snapshot_identifier.as_deref(), "SnapshotIdentifier")?;
        let cluster_id = required(spec.db_cluster_identifier.as_deref(), "DBClusterIdentifier")?;

        let snapshot = find_cluster_snapshot(self.rds, ctx, snapshot_id)
            .await?
            .ok_or_else(|| {
                ApiError::not_found(format!("cluster snapshot {snapshot_id} not found"))
            })?;
        let Some(engine) = snapshot.engine.clone() else {
            return Err(ApiError::internal(format!(
                "cluster snapshot {snapshot_id} has no engine"
            )));
        };
        let serverless = snapshot.engine_mode.as_deref() == Some(SERVERLESS_ENGINE_MODE);

        // Provisioned clusters are unusable without an instance, so the
        // companion's class is checked before anything is restored.
        let instance_class = if serverless {
            None
        } else {
            let class = instance_spec
                .and_then(|i| snapshot_of(i.db_instance_class.as_deref()))
                .ok_or_else(|| {
                    ApiError::bad_request(format!(
                        "Instance with DBInstanceClass is required to restore {} snapshot {snapshot_id}",
                        snapshot.engine_mode.as_deref().unwrap_or("provisioned")
                    ))
                })?;
            Some(class.to_string())
        };

        let params = self.params();
        let cluster_group = match &spec.db_cluster_parameter_group_name {
            Some(group) => Some(group.clone()),
            None => {
                params
                    .default_group(
                        ctx,
                        ParameterGroupKind::Cluster,
                        Some(&engine),
                        snapshot.engine_version.as_deref(),
                    )
                    .await?
            }
        };
        let instance_group = match (&instance_class, instance_spec) {
            (None, _) => None,
            (Some(_), Some(i)) if i.db_parameter_group_name.is_some() => {
                i.db_parameter_group_name.clone()
            }
            (Some(_), _) => {
                params
                    .default_group(
                        ctx,
                        ParameterGroupKind::Instance,
                        Some(&engine),
                        snapshot.engine_version.as_deref(),
                    )
                    .await?
            }
        };

        let input = RestoreClusterInput {
            db_cluster_identifier: cluster_id.to_string(),
            snapshot_identifier: snapshot_id.to_string(),
            engine: engine.clone(),
            engine_mode: snapshot.engine_mode.clone(),
            engine_version: snapshot.engine_version.clone(),
            db_cluster_parameter_group_name: cluster_group,
            db_subnet_group_name: self
                .tenant
                .subnet_group_or_default(spec.db_subnet_group_name.as_deref()),
            port: spec.port,
            vpc_security_group_ids: spec.vpc_security_group_ids.clone(),
            enable_cloudwatch_logs_exports: spec.enable_cloudwatch_logs_exports.clone(),
            scaling_configuration: spec.scaling_configuration.clone(),
            tags: self.tenant.normalize_tags(&spec.tags),
        };

        let cluster = ctx
            .run(self.rds.restore_cluster_from_snapshot(&input))
            .await
            .map_err(|e| {
                ApiError::from_provider("failed to restore database cluster from snapshot", e)
            })?;
        info!(
            cluster_id,
            snapshot_id,
            engine_mode = ?cluster.engine_mode,
            "Restoring database cluster from snapshot"
        );

        let mut response = DatabaseResponse {
            cluster: Some(cluster),
            instance: None,
        };

        let (Some(class), Some(instance_spec)) = (instance_class, instance_spec) else {
            return Ok(response);
        };

        let companion = CreateInstanceInput {
            db_instance_identifier: cluster_id.to_string(),
            db_instance_class: Some(class),
            db_cluster_identifier: Some(cluster_id.to_string()),
            engine: Some(engine),
            db_parameter_group_name: instance_group,
            db_subnet_group_name: self
                .tenant
                .subnet_group_or_default(instance_spec.db_subnet_group_name.as_deref()),
            enable_cloudwatch_logs_exports: instance_spec.enable_cloudwatch_logs_exports.clone(),
            tags: self.tenant.normalize_tags(&instance_spec.tags),
            ..Default::default()
        };

        match ctx.run(self.rds.create_instance(&companion)).await {
            Ok(instance) => {
                info!(
                    instance_id = %instance.db_instance_identifier,
                    cluster_id,
                    "Created instance in restored cluster"
                );
                response.instance = Some(instance);
                Ok(response)
            }
            Err(e) => {
                warn!(cluster_id, error = %e, "Instance creation failed, deleting restored cluster");
                compensate(
                    "delete-cluster",
                    cluster_id,
                    self.rds
                        .delete_cluster(&DeleteInput::skip_final_snapshot(cluster_id)),
                )
                .await;
                Err(ApiError::from_provider("failed to create database instance", e))
            }
        }
    }

    async fn restore_instance(
        &self,
        ctx: &CallContext,
        spec: &InstanceSpec,
    ) -> Result<DatabaseResponse, ApiError> {
        let snapshot_id = required(spec.snapshot_identifier.as_deref(), "SnapshotIdentifier")?;
        let instance_id =
            required(spec.db_instance_identifier.as_deref(), "DBInstanceIdentifier")?;

        let snapshot = find_instance_snapshot(self.rds, ctx, snapshot_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("snapshot {snapshot_id} not found")))?;

        let parameter_group = match &spec.db_parameter_group_name {
            Some(group) => Some(group.clone()),
            None => {
                self.params()
                    .default_group(
                        ctx,
                        ParameterGroupKind::Instance,
                        snapshot.engine.as_deref(),
                        snapshot.engine_version.as_deref(),
                    )
                    .await?
            }
        };

        let input = RestoreInstanceInput {
            db_instance_identifier: instance_id.to_string(),
            db_snapshot_identifier: snapshot_id.to_string(),
            engine: snapshot.engine.clone(),
            db_instance_class: spec.db_instance_class.clone(),
            db_parameter_group_name: parameter_group,
            db_subnet_group_name: self
                .tenant
                .subnet_group_or_default(spec.db_subnet_group_name.as_deref()),
            multi_az: spec.multi_az,
            port: spec.port,
            vpc_security_group_ids: spec.vpc_security_group_ids.clone(),
            tags: self.tenant.normalize_tags(&spec.tags),
        };

        let instance = ctx
            .run(self.rds.restore_instance_from_snapshot(&input))
            .await
            .map_err(|e| {
                ApiError::from_provider("failed to restore database instance from snapshot", e)
            })?;
        info!(instance_id, snapshot_id, "Restoring database instance from snapshot");

        Ok(DatabaseResponse {
            cluster: None,
            instance: Some(instance),
        })
    }
}
