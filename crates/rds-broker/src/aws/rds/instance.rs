//! DB instance calls

use super::{
    CreateInstanceInput, DbInstance, DeleteInput, ModifyInstanceInput, RdsClient,
    RestoreInstanceInput, missing, non_empty, owned, to_sdk_tags,
};
use crate::aws::error::ProviderError;
use tracing::debug;

type Result<T> = std::result::Result<T, ProviderError>;

const INSTANCE_NOT_FOUND: &str = "DBInstanceNotFound";

impl From<&aws_sdk_rds::types::DbInstance> for DbInstance {
    fn from(i: &aws_sdk_rds::types::DbInstance) -> Self {
        Self {
            db_instance_identifier: i.db_instance_identifier().unwrap_or_default().to_string(),
            db_instance_arn: owned(i.db_instance_arn()),
            db_instance_class: owned(i.db_instance_class()),
            db_cluster_identifier: owned(i.db_cluster_identifier()),
            engine: owned(i.engine()),
            engine_version: owned(i.engine_version()),
            status: owned(i.db_instance_status()),
            endpoint: i.endpoint().and_then(|e| owned(e.address())),
            port: i.endpoint().and_then(|e| e.port()),
        }
    }
}

impl RdsClient {
    pub async fn describe_instance(&self, id: &str) -> Result<DbInstance> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(id)
            .send()
            .await?;

        output
            .db_instances()
            .first()
            .map(DbInstance::from)
            .ok_or_else(|| {
                ProviderError::new(INSTANCE_NOT_FOUND, format!("DBInstance {id} not found"))
            })
    }

    pub async fn describe_instances(&self) -> Result<Vec<DbInstance>> {
        let instances = self
            .client
            .describe_db_instances()
            .into_paginator()
            .items()
            .send()
            .collect::<std::result::Result<Vec<_>, _>>()
            .await?;
        Ok(instances.iter().map(DbInstance::from).collect())
    }

    pub async fn create_instance(&self, input: &CreateInstanceInput) -> Result<DbInstance> {
        debug!(instance_id = %input.db_instance_identifier, "CreateDBInstance");
        let output = self
            .client
            .create_db_instance()
            .db_instance_identifier(&input.db_instance_identifier)
            .set_db_instance_class(input.db_instance_class.clone())
            .set_db_cluster_identifier(input.db_cluster_identifier.clone())
            .set_engine(input.engine.clone())
            .set_engine_version(input.engine_version.clone())
            .set_allocated_storage(input.allocated_storage)
            .set_backup_retention_period(input.backup_retention_period)
            .set_db_parameter_group_name(input.db_parameter_group_name.clone())
            .set_db_subnet_group_name(input.db_subnet_group_name.clone())
            .set_license_model(input.license_model.clone())
            .set_master_username(input.master_username.clone())
            .set_master_user_password(input.master_user_password.clone())
            .set_multi_az(input.multi_az)
            .set_port(input.port)
            .set_storage_encrypted(input.storage_encrypted)
            .set_vpc_security_group_ids(non_empty(&input.vpc_security_group_ids))
            .set_enable_cloudwatch_logs_exports(non_empty(&input.enable_cloudwatch_logs_exports))
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await?;

        output
            .db_instance()
            .map(DbInstance::from)
            .ok_or_else(|| missing("DBInstance"))
    }

    pub async fn modify_instance(&self, input: &ModifyInstanceInput) -> Result<DbInstance> {
        let output = self
            .client
            .modify_db_instance()
            .db_instance_identifier(&input.db_instance_identifier)
            .set_db_instance_class(input.db_instance_class.clone())
            .set_engine_version(input.engine_version.clone())
            .set_db_parameter_group_name(input.db_parameter_group_name.clone())
            .set_allocated_storage(input.allocated_storage)
            .set_allow_major_version_upgrade(input.allow_major_version_upgrade)
            .set_apply_immediately(input.apply_immediately)
            .set_backup_retention_period(input.backup_retention_period)
            .set_master_user_password(input.master_user_password.clone())
            .set_multi_az(input.multi_az)
            .set_vpc_security_group_ids(non_empty(&input.vpc_security_group_ids))
            .send()
            .await?;

        output
            .db_instance()
            .map(DbInstance::from)
            .ok_or_else(|| missing("DBInstance"))
    }

    pub async fn delete_instance(&self, input: &DeleteInput) -> Result<DbInstance> {
        let output = self
            .client
            .delete_db_instance()
            .db_instance_identifier(&input.identifier)
            .skip_final_snapshot(input.final_snapshot_identifier.is_none())
            .set_final_db_snapshot_identifier(input.final_snapshot_identifier.clone())
            .send()
            .await?;

        output
            .db_instance()
            .map(DbInstance::from)
            .ok_or_else(|| missing("DBInstance"))
    }

    pub async fn start_instance(&self, id: &str) -> Result<DbInstance> {
        let output = self
            .client
            .start_db_instance()
            .db_instance_identifier(id)
            .send()
            .await?;
        output
            .db_instance()
            .map(DbInstance::from)
            .ok_or_else(|| missing("DBInstance"))
    }

    pub async fn stop_instance(&self, id: &str) -> Result<DbInstance> {
        let output = self
            .client
            .stop_db_instance()
            .db_instance_identifier(id)
            .send()
            .await?;
        output
            .db_instance()
            .map(DbInstance::from)
            .ok_or_else(|| missing("DBInstance"))
    }

    pub async fn restore_instance_from_snapshot(
        &self,
        input: &RestoreInstanceInput,
    ) -> Result<DbInstance> {
        let output = self
            .client
            .restore_db_instance_from_db_snapshot()
            .db_instance_identifier(&input.db_instance_identifier)
            .db_snapshot_identifier(&input.db_snapshot_identifier)
            .set_engine(input.engine.clone())
            .set_db_instance_class(input.db_instance_class.clone())
            .set_db_parameter_group_name(input.db_parameter_group_name.clone())
            .set_db_subnet_group_name(input.db_subnet_group_name.clone())
            .set_multi_az(input.multi_az)
            .set_port(input.port)
            .set_vpc_security_group_ids(non_empty(&input.vpc_security_group_ids))
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await?;

        output
            .db_instance()
            .map(DbInstance::from)
            .ok_or_else(|| missing("DBInstance"))
    }
}
