//! Request and response types of the orchestrators
//!
//! Requests deserialize from the provider's PascalCase field names so callers
//! can send the same documents they would send to RDS. They are never mutated:
//! defaults are applied while building the provider payloads.

use crate::aws::rds::{
    ClusterSnapshot, DbCluster, DbInstance, InstanceSnapshot, ScalingConfiguration,
};
use rds_broker_common::Tag;
use serde::{Deserialize, Serialize};

/// Cluster half of a create or restore request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClusterSpec {
    pub backup_retention_period: Option<i32>,
    #[serde(rename = "DBClusterIdentifier")]
    pub db_cluster_identifier: Option<String>,
    #[serde(rename = "DBClusterParameterGroupName")]
    pub db_cluster_parameter_group_name: Option<String>,
    #[serde(rename = "DBSubnetGroupName")]
    pub db_subnet_group_name: Option<String>,
    pub enable_cloudwatch_logs_exports: Vec<String>,
    pub engine: Option<String>,
    pub engine_mode: Option<String>,
    pub engine_version: Option<String>,
    pub master_user_password: Option<String>,
    pub master_username: Option<String>,
    pub port: Option<i32>,
    pub scaling_configuration: Option<ScalingConfiguration>,
    /// Restore from this snapshot instead of creating
    pub snapshot_identifier: Option<String>,
    pub storage_encrypted: Option<bool>,
    pub tags: Vec<Tag>,
    pub vpc_security_group_ids: Vec<String>,
}

/// Instance half of a create or restore request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceSpec {
    pub allocated_storage: Option<i32>,
    pub backup_retention_period: Option<i32>,
    #[serde(rename = "DBClusterIdentifier")]
    pub db_cluster_identifier: Option<String>,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: Option<String>,
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: Option<String>,
    #[serde(rename = "DBParameterGroupName")]
    pub db_parameter_group_name: Option<String>,
    #[serde(rename = "DBSubnetGroupName")]
    pub db_subnet_group_name: Option<String>,
    pub enable_cloudwatch_logs_exports: Vec<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub license_model: Option<String>,
    pub master_user_password: Option<String>,
    pub master_username: Option<String>,
    #[serde(rename = "MultiAZ")]
    pub multi_az: Option<bool>,
    pub port: Option<i32>,
    /// Restore from this snapshot instead of creating
    pub snapshot_identifier: Option<String>,
    pub storage_encrypted: Option<bool>,
    pub tags: Vec<Tag>,
    pub vpc_security_group_ids: Vec<String>,
}

/// Create (or restore) a cluster, an instance, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatabaseCreateRequest {
    pub cluster: Option<ClusterSpec>,
    pub instance: Option<InstanceSpec>,
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

impl DatabaseCreateRequest {
    /// Whether either half names a snapshot to restore from
    pub fn is_restore(&self) -> bool {
        self.cluster
            .as_ref()
            .is_some_and(|c| has_text(c.snapshot_identifier.as_deref()))
            || self
                .instance
                .as_ref()
                .is_some_and(|i| has_text(i.snapshot_identifier.as_deref()))
    }
}

/// Fields of ModifyDBCluster a caller may change
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClusterModifySpec {
    pub allow_major_version_upgrade: Option<bool>,
    pub apply_immediately: Option<bool>,
    pub backup_retention_period: Option<i32>,
    #[serde(rename = "DBClusterParameterGroupName")]
    pub db_cluster_parameter_group_name: Option<String>,
    pub engine_version: Option<String>,
    pub master_user_password: Option<String>,
    pub port: Option<i32>,
    pub scaling_configuration: Option<ScalingConfiguration>,
    pub vpc_security_group_ids: Vec<String>,
}

/// Fields of ModifyDBInstance a caller may change
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceModifySpec {
    pub allocated_storage: Option<i32>,
    pub allow_major_version_upgrade: Option<bool>,
    pub apply_immediately: Option<bool>,
    pub backup_retention_period: Option<i32>,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: Option<String>,
    #[serde(rename = "DBParameterGroupName")]
    pub db_parameter_group_name: Option<String>,
    pub engine_version: Option<String>,
    pub master_user_password: Option<String>,
    #[serde(rename = "MultiAZ")]
    pub multi_az: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
}

/// Modify one resource and/or its tags.
///
/// `cluster` and `instance` are mutually exclusive; `tags` applies to every
/// resource named by the identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatabaseModifyRequest {
    pub cluster: Option<ClusterModifySpec>,
    pub instance: Option<InstanceModifySpec>,
    pub tags: Option<Vec<Tag>>,
}

/// Desired power state, as sent by callers (`"start"` or `"stop"`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatabaseStateRequest {
    pub state: String,
}

/// Take a manual snapshot of a cluster or instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SnapshotCreateRequest {
    pub snapshot_identifier: String,
}

/// Upgrade the engine version recorded in an instance snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SnapshotModifyRequest {
    pub engine_version: String,
}

/// Cluster and/or instance a database operation acted upon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseResponse {
    #[serde(rename = "DBCluster", skip_serializing_if = "Option::is_none")]
    pub cluster: Option<DbCluster>,
    #[serde(rename = "DBInstance", skip_serializing_if = "Option::is_none")]
    pub instance: Option<DbInstance>,
}

impl DatabaseResponse {
    pub fn is_empty(&self) -> bool {
        self.cluster.is_none() && self.instance.is_none()
    }
}

/// Result of listing databases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseList {
    /// Only populated when clusters were requested
    #[serde(rename = "DBClusters", skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Vec<DbCluster>>,
    #[serde(rename = "DBInstances")]
    pub instances: Vec<DbInstance>,
}

/// Snapshot create/get/delete result; the identifier may live in either namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotResponse {
    #[serde(rename = "DBClusterSnapshot", skip_serializing_if = "Option::is_none")]
    pub cluster_snapshot: Option<ClusterSnapshot>,
    #[serde(rename = "DBSnapshot", skip_serializing_if = "Option::is_none")]
    pub instance_snapshot: Option<InstanceSnapshot>,
}

impl SnapshotResponse {
    pub fn is_empty(&self) -> bool {
        self.cluster_snapshot.is_none() && self.instance_snapshot.is_none()
    }
}

/// Snapshots of one database, or those removed by a purge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotList {
    #[serde(rename = "DBClusterSnapshots", skip_serializing_if = "Vec::is_empty")]
    pub cluster_snapshots: Vec<ClusterSnapshot>,
    #[serde(rename = "DBSnapshots", skip_serializing_if = "Vec::is_empty")]
    pub instance_snapshots: Vec<InstanceSnapshot>,
    /// Cluster snapshot count when there are any, else the instance count
    #[serde(skip)]
    pub items: usize,
}

impl SnapshotList {
    pub fn new(
        cluster_snapshots: Vec<ClusterSnapshot>,
        instance_snapshots: Vec<InstanceSnapshot>,
    ) -> Self {
        let items = if cluster_snapshots.is_empty() {
            instance_snapshots.len()
        } else {
            cluster_snapshots.len()
        };
        Self {
            cluster_snapshots,
            instance_snapshots,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cluster_snapshots.is_empty() && self.instance_snapshots.is_empty()
    }
}
