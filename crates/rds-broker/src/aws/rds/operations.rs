//! RDS operations trait for testing

use super::RdsClient;
use super::types::{
    ClusterSnapshot, CreateClusterInput, CreateInstanceInput, CreateSnapshotInput, DbCluster,
    DbInstance, DeleteInput, EngineVersion, InstanceSnapshot, ModifyClusterInput,
    ModifyInstanceInput, RestoreClusterInput, RestoreInstanceInput, SnapshotQuery,
};
use crate::aws::error::ProviderError;
use rds_broker_common::Tag;
use std::future::Future;

type Result<T> = std::result::Result<T, ProviderError>;

/// The narrow slice of the RDS API the orchestrators depend on.
///
/// Implemented by [`RdsClient`] against AWS and by in-memory fakes in tests.
/// Single-resource describes fail with the provider's not-found code when the
/// identifier does not exist.
pub trait RdsOperations: Send + Sync {
    // Clusters

    fn describe_cluster(&self, id: &str) -> impl Future<Output = Result<DbCluster>> + Send;

    fn describe_clusters(&self) -> impl Future<Output = Result<Vec<DbCluster>>> + Send;

    fn create_cluster(
        &self,
        input: &CreateClusterInput,
    ) -> impl Future<Output = Result<DbCluster>> + Send;

    fn modify_cluster(
        &self,
        input: &ModifyClusterInput,
    ) -> impl Future<Output = Result<DbCluster>> + Send;

    fn delete_cluster(&self, input: &DeleteInput) -> impl Future<Output = Result<DbCluster>> + Send;

    fn start_cluster(&self, id: &str) -> impl Future<Output = Result<DbCluster>> + Send;

    fn stop_cluster(&self, id: &str) -> impl Future<Output = Result<DbCluster>> + Send;

    fn restore_cluster_from_snapshot(
        &self,
        input: &RestoreClusterInput,
    ) -> impl Future<Output = Result<DbCluster>> + Send;

    // Instances

    fn describe_instance(&self, id: &str) -> impl Future<Output = Result<DbInstance>> + Send;

    fn describe_instances(&self) -> impl Future<Output = Result<Vec<DbInstance>>> + Send;

    fn create_instance(
        &self,
        input: &CreateInstanceInput,
    ) -> impl Future<Output = Result<DbInstance>> + Send;

    fn modify_instance(
        &self,
        input: &ModifyInstanceInput,
    ) -> impl Future<Output = Result<DbInstance>> + Send;

    fn delete_instance(
        &self,
        input: &DeleteInput,
    ) -> impl Future<Output = Result<DbInstance>> + Send;

    fn start_instance(&self, id: &str) -> impl Future<Output = Result<DbInstance>> + Send;

    fn stop_instance(&self, id: &str) -> impl Future<Output = Result<DbInstance>> + Send;

    fn restore_instance_from_snapshot(
        &self,
        input: &RestoreInstanceInput,
    ) -> impl Future<Output = Result<DbInstance>> + Send;

    // Snapshots

    fn describe_cluster_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> impl Future<Output = Result<Vec<ClusterSnapshot>>> + Send;

    fn describe_instance_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> impl Future<Output = Result<Vec<InstanceSnapshot>>> + Send;

    fn create_cluster_snapshot(
        &self,
        input: &CreateSnapshotInput,
    ) -> impl Future<Output = Result<ClusterSnapshot>> + Send;

    fn create_instance_snapshot(
        &self,
        input: &CreateSnapshotInput,
    ) -> impl Future<Output = Result<InstanceSnapshot>> + Send;

    fn delete_cluster_snapshot(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ClusterSnapshot>> + Send;

    fn delete_instance_snapshot(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<InstanceSnapshot>> + Send;

    fn modify_instance_snapshot(
        &self,
        id: &str,
        engine_version: &str,
    ) -> impl Future<Output = Result<InstanceSnapshot>> + Send;

    // Misc

    fn add_tags(&self, arn: &str, tags: &[Tag]) -> impl Future<Output = Result<()>> + Send;

    fn describe_engine_versions(
        &self,
        engine: &str,
        engine_version: Option<&str>,
    ) -> impl Future<Output = Result<Vec<EngineVersion>>> + Send;
}

impl RdsOperations for RdsClient {
    async fn describe_cluster(&self, id: &str) -> Result<DbCluster> {
        RdsClient::describe_cluster(self, id).await
    }

    async fn describe_clusters(&self) -> Result<Vec<DbCluster>> {
        RdsClient::describe_clusters(self).await
    }

    async fn create_cluster(&self, input: &CreateClusterInput) -> Result<DbCluster> {
        RdsClient::create_cluster(self, input).await
    }

    async fn modify_cluster(&self, input: &ModifyClusterInput) -> Result<DbCluster> {
        RdsClient::modify_cluster(self, input).await
    }

    async fn delete_cluster(&self, input: &DeleteInput) -> Result<DbCluster> {
        RdsClient::delete_cluster(self, input).await
    }

    async fn start_cluster(&self, id: &str) -> Result<DbCluster> {
        RdsClient::start_cluster(self, id).await
    }

    async fn stop_cluster(&self, id: &str) -> Result<DbCluster> {
        RdsClient::stop_cluster(self, id).await
    }

    async fn restore_cluster_from_snapshot(&self, input: &RestoreClusterInput) -> Result<DbCluster> {
        RdsClient::restore_cluster_from_snapshot(self, input).await
    }

    async fn describe_instance(&self, id: &str) -> Result<DbInstance> {
        RdsClient::describe_instance(self, id).await
    }

    async fn describe_instances(&self) -> Result<Vec<DbInstance>> {
        RdsClient::describe_instances(self).await
    }

    async fn create_instance(&self, input: &CreateInstanceInput) -> Result<DbInstance> {
        RdsClient::create_instance(self, input).await
    }

    async fn modify_instance(&self, input: &ModifyInstanceInput) -> Result<DbInstance> {
        RdsClient::modify_instance(self, input).await
    }

    async fn delete_instance(&self, input: &DeleteInput) -> Result<DbInstance> {
        RdsClient::delete_instance(self, input).await
    }

    async fn start_instance(&self, id: &str) -> Result<DbInstance> {
        RdsClient::start_instance(self, id).await
    }

    async fn stop_instance(&self, id: &str) -> Result<DbInstance> {
        RdsClient::stop_instance(self, id).await
    }

    async fn restore_instance_from_snapshot(
        &self,
        input: &RestoreInstanceInput,
    ) -> Result<DbInstance> {
        RdsClient::restore_instance_from_snapshot(self, input).await
    }

    async fn describe_cluster_snapshots(&self, query: &SnapshotQuery) -> Result<Vec<ClusterSnapshot>> {
        RdsClient::describe_cluster_snapshots(self, query).await
    }

    async fn describe_instance_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Vec<InstanceSnapshot>> {
        RdsClient::describe_instance_snapshots(self, query).await
    }

    async fn create_cluster_snapshot(&self, input: &CreateSnapshotInput) -> Result<ClusterSnapshot> {
        RdsClient::create_cluster_snapshot(self, input).await
    }

    async fn create_instance_snapshot(
        &self,
        input: &CreateSnapshotInput,
    ) -> Result<InstanceSnapshot> {
        RdsClient::create_instance_snapshot(self, input).await
    }

    async fn delete_cluster_snapshot(&self, id: &str) -> Result<ClusterSnapshot> {
        RdsClient::delete_cluster_snapshot(self, id).await
    }

    async fn delete_instance_snapshot(&self, id: &str) -> Result<InstanceSnapshot> {
        RdsClient::delete_instance_snapshot(self, id).await
    }

    async fn modify_instance_snapshot(
        &self,
        id: &str,
        engine_version: &str,
    ) -> Result<InstanceSnapshot> {
        RdsClient::modify_instance_snapshot(self, id, engine_version).await
    }

    async fn add_tags(&self, arn: &str, tags: &[Tag]) -> Result<()> {
        RdsClient::add_tags(self, arn, tags).await
    }

    async fn describe_engine_versions(
        &self,
        engine: &str,
        engine_version: Option<&str>,
    ) -> Result<Vec<EngineVersion>> {
        RdsClient::describe_engine_versions(self, engine, engine_version).await
    }
}
