//! Manual snapshot calls for both clusters and instances

use super::{
    ClusterSnapshot, CreateSnapshotInput, InstanceSnapshot, RdsClient, SnapshotQuery, missing,
    owned, to_chrono, to_sdk_tags,
};
use crate::aws::error::ProviderError;

type Result<T> = std::result::Result<T, ProviderError>;

/// Snapshot type filter for manual snapshots
const MANUAL: &str = "manual";

impl From<&aws_sdk_rds::types::DbClusterSnapshot> for ClusterSnapshot {
    fn from(s: &aws_sdk_rds::types::DbClusterSnapshot) -> Self {
        Self {
            snapshot_identifier: s.db_cluster_snapshot_identifier().unwrap_or_default().to_string(),
            snapshot_arn: owned(s.db_cluster_snapshot_arn()),
            db_cluster_identifier: owned(s.db_cluster_identifier()),
            engine: owned(s.engine()),
            engine_mode: owned(s.engine_mode()),
            engine_version: owned(s.engine_version()),
            status: owned(s.status()),
            snapshot_type: owned(s.snapshot_type()),
            snapshot_create_time: to_chrono(s.snapshot_create_time()),
        }
    }
}

impl From<&aws_sdk_rds::types::DbSnapshot> for InstanceSnapshot {
    fn from(s: &aws_sdk_rds::types::DbSnapshot) -> Self {
        Self {
            snapshot_identifier: s.db_snapshot_identifier().unwrap_or_default().to_string(),
            snapshot_arn: owned(s.db_snapshot_arn()),
            db_instance_identifier: owned(s.db_instance_identifier()),
            engine: owned(s.engine()),
            engine_version: owned(s.engine_version()),
            status: owned(s.status()),
            snapshot_type: owned(s.snapshot_type()),
            snapshot_create_time: to_chrono(s.snapshot_create_time()),
        }
    }
}

impl RdsClient {
    pub async fn describe_cluster_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Vec<ClusterSnapshot>> {
        let request = self.client.describe_db_cluster_snapshots();
        let request = match query {
            SnapshotQuery::ById(id) => request.db_cluster_snapshot_identifier(id),
            SnapshotQuery::OfSource(cluster) => request.db_cluster_identifier(cluster),
            SnapshotQuery::AllManual => request.snapshot_type(MANUAL),
        };

        let snapshots = request
            .into_paginator()
            .items()
            .send()
            .collect::<std::result::Result<Vec<_>, _>>()
            .await?;
        Ok(snapshots.iter().map(ClusterSnapshot::from).collect())
    }

    pub async fn describe_instance_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Vec<InstanceSnapshot>> {
        let request = self.client.describe_db_snapshots();
        let request = match query {
            SnapshotQuery::ById(id) => request.db_snapshot_identifier(id),
            SnapshotQuery::OfSource(instance) => request.db_instance_identifier(instance),
            SnapshotQuery::AllManual => request.snapshot_type(MANUAL),
        };

        let snapshots = request
            .into_paginator()
            .items()
            .send()
            .collect::<std::result::Result<Vec<_>, _>>()
            .await?;
        Ok(snapshots.iter().map(InstanceSnapshot::from).collect())
    }

    pub async fn create_cluster_snapshot(
        &self,
        input: &CreateSnapshotInput,
    ) -> Result<ClusterSnapshot> {
        let output = self
            .client
            .create_db_cluster_snapshot()
            .db_cluster_identifier(&input.source_identifier)
            .db_cluster_snapshot_identifier(&input.snapshot_identifier)
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await?;
        output
            .db_cluster_snapshot()
            .map(ClusterSnapshot::from)
            .ok_or_else(|| missing("DBClusterSnapshot"))
    }

    pub async fn create_instance_snapshot(
        &self,
        input: &CreateSnapshotInput,
    ) -> Result<InstanceSnapshot> {
        let output = self
            .client
            .create_db_snapshot()
            .db_instance_identifier(&input.source_identifier)
            .db_snapshot_identifier(&input.snapshot_identifier)
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await?;
        output
            .db_snapshot()
            .map(InstanceSnapshot::from)
            .ok_or_else(|| missing("DBSnapshot"))
    }

    pub async fn delete_cluster_snapshot(&self, id: &str) -> Result<ClusterSnapshot> {
        let output = self
            .client
            .delete_db_cluster_snapshot()
            .db_cluster_snapshot_identifier(id)
            .send()
            .await?;
        output
            .db_cluster_snapshot()
            .map(ClusterSnapshot::from)
            .ok_or_else(|| missing("DBClusterSnapshot"))
    }

    pub async fn delete_instance_snapshot(&self, id: &str) -> Result<InstanceSnapshot> {
        let output = self
            .client
            .delete_db_snapshot()
            .db_snapshot_identifier(id)
            .send()
            .await?;
        output
            .db_snapshot()
            .map(InstanceSnapshot::from)
            .ok_or_else(|| missing("DBSnapshot"))
    }

    pub async fn modify_instance_snapshot(
        &self,
        id: &str,
        engine_version: &str,
    ) -> Result<InstanceSnapshot> {
        let output = self
            .client
            .modify_db_snapshot()
            .db_snapshot_identifier(id)
            .engine_version(engine_version)
            .send()
            .await?;
        output
            .db_snapshot()
            .map(InstanceSnapshot::from)
            .ok_or_else(|| missing("DBSnapshot"))
    }
}
