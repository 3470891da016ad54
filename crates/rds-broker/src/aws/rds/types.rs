//! RDS payload and result types
//!
//! Payloads are built fresh by the orchestrators for every provider call.
//! Results are the subset of the provider's representation the broker
//! reports back to callers, serialized with the provider's field names.

use chrono::{DateTime, Utc};
use rds_broker_common::Tag;
use serde::{Deserialize, Serialize};

/// Aurora Serverless v1 scaling settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ScalingConfiguration {
    pub auto_pause: Option<bool>,
    pub max_capacity: Option<i32>,
    pub min_capacity: Option<i32>,
    pub seconds_until_auto_pause: Option<i32>,
    pub timeout_action: Option<String>,
}

/// Payload for CreateDBCluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateClusterInput {
    pub db_cluster_identifier: String,
    pub engine: Option<String>,
    pub engine_mode: Option<String>,
    pub engine_version: Option<String>,
    pub db_cluster_parameter_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub master_username: Option<String>,
    pub master_user_password: Option<String>,
    pub port: Option<i32>,
    pub backup_retention_period: Option<i32>,
    pub storage_encrypted: bool,
    pub vpc_security_group_ids: Vec<String>,
    pub enable_cloudwatch_logs_exports: Vec<String>,
    pub scaling_configuration: Option<ScalingConfiguration>,
    pub tags: Vec<Tag>,
}

/// Payload for CreateDBInstance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateInstanceInput {
    pub db_instance_identifier: String,
    pub db_instance_class: Option<String>,
    pub db_cluster_identifier: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub allocated_storage: Option<i32>,
    pub backup_retention_period: Option<i32>,
    pub db_parameter_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub license_model: Option<String>,
    pub master_username: Option<String>,
    pub master_user_password: Option<String>,
    pub multi_az: Option<bool>,
    pub port: Option<i32>,
    /// `None` for cluster members, which inherit the cluster's encryption
    pub storage_encrypted: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
    pub enable_cloudwatch_logs_exports: Vec<String>,
    pub tags: Vec<Tag>,
}

/// Payload for ModifyDBCluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyClusterInput {
    pub db_cluster_identifier: String,
    pub engine_version: Option<String>,
    pub db_cluster_parameter_group_name: Option<String>,
    pub allow_major_version_upgrade: Option<bool>,
    pub apply_immediately: Option<bool>,
    pub backup_retention_period: Option<i32>,
    pub master_user_password: Option<String>,
    pub port: Option<i32>,
    pub vpc_security_group_ids: Vec<String>,
    pub scaling_configuration: Option<ScalingConfiguration>,
}

/// Payload for ModifyDBInstance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyInstanceInput {
    pub db_instance_identifier: String,
    pub db_instance_class: Option<String>,
    pub engine_version: Option<String>,
    pub db_parameter_group_name: Option<String>,
    pub allocated_storage: Option<i32>,
    pub allow_major_version_upgrade: Option<bool>,
    pub apply_immediately: Option<bool>,
    pub backup_retention_period: Option<i32>,
    pub master_user_password: Option<String>,
    pub multi_az: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
}

/// Payload for DeleteDBCluster / DeleteDBInstance.
///
/// A final snapshot is taken only when `final_snapshot_identifier` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteInput {
    pub identifier: String,
    pub final_snapshot_identifier: Option<String>,
}

impl DeleteInput {
    pub fn skip_final_snapshot(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            final_snapshot_identifier: None,
        }
    }

    pub fn with_final_snapshot(identifier: impl Into<String>, snapshot: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            final_snapshot_identifier: Some(snapshot.into()),
        }
    }
}

/// Payload for RestoreDBClusterFromSnapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreClusterInput {
    pub db_cluster_identifier: String,
    pub snapshot_identifier: String,
    pub engine: String,
    pub engine_mode: Option<String>,
    pub engine_version: Option<String>,
    pub db_cluster_parameter_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub port: Option<i32>,
    pub vpc_security_group_ids: Vec<String>,
    pub enable_cloudwatch_logs_exports: Vec<String>,
    pub scaling_configuration: Option<ScalingConfiguration>,
    pub tags: Vec<Tag>,
}

/// Payload for RestoreDBInstanceFromDBSnapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreInstanceInput {
    pub db_instance_identifier: String,
    pub db_snapshot_identifier: String,
    pub engine: Option<String>,
    pub db_instance_class: Option<String>,
    pub db_parameter_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub multi_az: Option<bool>,
    pub port: Option<i32>,
    pub vpc_security_group_ids: Vec<String>,
    pub tags: Vec<Tag>,
}

/// Payload for CreateDBClusterSnapshot / CreateDBSnapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSnapshotInput {
    /// Cluster or instance being snapshotted
    pub source_identifier: String,
    pub snapshot_identifier: String,
    pub tags: Vec<Tag>,
}

/// Filter for the snapshot describe calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotQuery {
    /// A single snapshot by identifier
    ById(String),
    /// Every snapshot of a given cluster or instance
    OfSource(String),
    /// Every manual snapshot in the account
    AllManual,
}

/// A DB cluster as reported to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbCluster {
    #[serde(rename = "DBClusterIdentifier")]
    pub db_cluster_identifier: String,
    #[serde(rename = "DBClusterArn")]
    pub db_cluster_arn: Option<String>,
    pub engine: Option<String>,
    pub engine_mode: Option<String>,
    pub engine_version: Option<String>,
    pub status: Option<String>,
    pub endpoint: Option<String>,
    pub port: Option<i32>,
    #[serde(rename = "DBClusterParameterGroup")]
    pub db_cluster_parameter_group: Option<String>,
    #[serde(rename = "DBClusterMembers")]
    pub members: Vec<String>,
}

/// A DB instance as reported to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbInstance {
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: String,
    #[serde(rename = "DBInstanceArn")]
    pub db_instance_arn: Option<String>,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: Option<String>,
    #[serde(rename = "DBClusterIdentifier")]
    pub db_cluster_identifier: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    #[serde(rename = "DBInstanceStatus")]
    pub status: Option<String>,
    pub endpoint: Option<String>,
    pub port: Option<i32>,
}

/// A manual or automated cluster snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterSnapshot {
    #[serde(rename = "DBClusterSnapshotIdentifier")]
    pub snapshot_identifier: String,
    #[serde(rename = "DBClusterSnapshotArn")]
    pub snapshot_arn: Option<String>,
    #[serde(rename = "DBClusterIdentifier")]
    pub db_cluster_identifier: Option<String>,
    pub engine: Option<String>,
    pub engine_mode: Option<String>,
    pub engine_version: Option<String>,
    pub status: Option<String>,
    pub snapshot_type: Option<String>,
    pub snapshot_create_time: Option<DateTime<Utc>>,
}

/// A manual or automated instance snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceSnapshot {
    #[serde(rename = "DBSnapshotIdentifier")]
    pub snapshot_identifier: String,
    #[serde(rename = "DBSnapshotArn")]
    pub snapshot_arn: Option<String>,
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub status: Option<String>,
    pub snapshot_type: Option<String>,
    pub snapshot_create_time: Option<DateTime<Utc>>,
}

/// One entry of DescribeDBEngineVersions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineVersion {
    pub engine: String,
    pub engine_version: String,
    #[serde(rename = "DBParameterGroupFamily")]
    pub db_parameter_group_family: Option<String>,
    pub valid_upgrade_target: Vec<String>,
}
