//! DB cluster calls

use super::{
    RdsClient, missing, non_empty, owned, to_sdk_scaling, to_sdk_tags, CreateClusterInput,
    DbCluster, DeleteInput, ModifyClusterInput, RestoreClusterInput,
};
use crate::aws::error::ProviderError;
use tracing::debug;

type Result<T> = std::result::Result<T, ProviderError>;

const CLUSTER_NOT_FOUND: &str = "DBClusterNotFoundFault";

impl From<&aws_sdk_rds::types::DbCluster> for DbCluster {
    fn from(c: &aws_sdk_rds::types::DbCluster) -> Self {
        Self {
            db_cluster_identifier: c.db_cluster_identifier().unwrap_or_default().to_string(),
            db_cluster_arn: owned(c.db_cluster_arn()),
            engine: owned(c.engine()),
            engine_mode: owned(c.engine_mode()),
            engine_version: owned(c.engine_version()),
            status: owned(c.status()),
            endpoint: owned(c.endpoint()),
            port: c.port(),
            db_cluster_parameter_group: owned(c.db_cluster_parameter_group()),
            members: c
                .db_cluster_members()
                .iter()
                .filter_map(|m| owned(m.db_instance_identifier()))
                .collect(),
        }
    }
}

impl RdsClient {
    pub async fn describe_cluster(&self, id: &str) -> Result<DbCluster> {
        let output = self
            .client
            .describe_db_clusters()
            .db_cluster_identifier(id)
            .send()
            .await?;

        output
            .db_clusters()
            .first()
            .map(DbCluster::from)
            .ok_or_else(|| ProviderError::new(CLUSTER_NOT_FOUND, format!("DBCluster {id} not found")))
    }

    pub async fn describe_clusters(&self) -> Result<Vec<DbCluster>> {
        let clusters = self
            .client
            .describe_db_clusters()
            .into_paginator()
            .items()
            .send()
            .collect::<std::result::Result<Vec<_>, _>>()
            .await?;
        Ok(clusters.iter().map(DbCluster::from).collect())
    }

    pub async fn create_cluster(&self, input: &CreateClusterInput) -> Result<DbCluster> {
        debug!(cluster_id = %input.db_cluster_identifier, "CreateDBCluster");
        let output = self
            .client
            .create_db_cluster()
            .db_cluster_identifier(&input.db_cluster_identifier)
            .set_engine(input.engine.clone())
            .set_engine_mode(input.engine_mode.clone())
            .set_engine_version(input.engine_version.clone())
            .set_db_cluster_parameter_group_name(input.db_cluster_parameter_group_name.clone())
            .set_db_subnet_group_name(input.db_subnet_group_name.clone())
            .set_master_username(input.master_username.clone())
            .set_master_user_password(input.master_user_password.clone())
            .set_port(input.port)
            .set_backup_retention_period(input.backup_retention_period)
            .storage_encrypted(input.storage_encrypted)
            .set_vpc_security_group_ids(non_empty(&input.vpc_security_group_ids))
            .set_enable_cloudwatch_logs_exports(non_empty(&input.enable_cloudwatch_logs_exports))
            .set_scaling_configuration(to_sdk_scaling(input.scaling_configuration.as_ref()))
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await?;

        output
            .db_cluster()
            .map(DbCluster::from)
            .ok_or_else(|| missing("DBCluster"))
    }

    pub async fn modify_cluster(&self, input: &ModifyClusterInput) -> Result<DbCluster> {
        let output = self
            .client
            .modify_db_cluster()
            .db_cluster_identifier(&input.db_cluster_identifier)
            .set_engine_version(input.engine_version.clone())
            .set_db_cluster_parameter_group_name(input.db_cluster_parameter_group_name.clone())
            .set_allow_major_version_upgrade(input.allow_major_version_upgrade)
            .set_apply_immediately(input.apply_immediately)
            .set_backup_retention_period(input.backup_retention_period)
            .set_master_user_password(input.master_user_password.clone())
            .set_port(input.port)
            .set_vpc_security_group_ids(non_empty(&input.vpc_security_group_ids))
            .set_scaling_configuration(to_sdk_scaling(input.scaling_configuration.as_ref()))
            .send()
            .await?;

        output
            .db_cluster()
            .map(DbCluster::from)
            .ok_or_else(|| missing("DBCluster"))
    }

    pub async fn delete_cluster(&self, input: &DeleteInput) -> Result<DbCluster> {
        let output = self
            .client
            .delete_db_cluster()
            .db_cluster_identifier(&input.identifier)
            .skip_final_snapshot(input.final_snapshot_identifier.is_none())
            .set_final_db_snapshot_identifier(input.final_snapshot_identifier.clone())
            .send()
            .await?;

        output
            .db_cluster()
            .map(DbCluster::from)
            .ok_or_else(|| missing("DBCluster"))
    }

    pub async fn start_cluster(&self, id: &str) -> Result<DbCluster> {
        let output = self
            .client
            .start_db_cluster()
            .db_cluster_identifier(id)
            .send()
            .await?;
        output
            .db_cluster()
            .map(DbCluster::from)
            .ok_or_else(|| missing("DBCluster"))
    }

    pub async fn stop_cluster(&self, id: &str) -> Result<DbCluster> {
        let output = self
            .client
            .stop_db_cluster()
            .db_cluster_identifier(id)
            .send()
            .await?;
        output
            .db_cluster()
            .map(DbCluster::from)
            .ok_or_else(|| missing("DBCluster"))
    }

    pub async fn restore_cluster_from_snapshot(
        &self,
        input: &RestoreClusterInput,
    ) -> Result<DbCluster> {
        let output = self
            .client
            .restore_db_cluster_from_snapshot()
            .db_cluster_identifier(&input.db_cluster_identifier)
            .snapshot_identifier(&input.snapshot_identifier)
            .engine(&input.engine)
            .set_engine_mode(input.engine_mode.clone())
            .set_engine_version(input.engine_version.clone())
            .set_db_cluster_parameter_group_name(input.db_cluster_parameter_group_name.clone())
            .set_db_subnet_group_name(input.db_subnet_group_name.clone())
            .set_port(input.port)
            .set_vpc_security_group_ids(non_empty(&input.vpc_security_group_ids))
            .set_enable_cloudwatch_logs_exports(non_empty(&input.enable_cloudwatch_logs_exports))
            .set_scaling_configuration(to_sdk_scaling(input.scaling_configuration.as_ref()))
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await?;

        output
            .db_cluster()
            .map(DbCluster::from)
            .ok_or_else(|| missing("DBCluster"))
    }
}
