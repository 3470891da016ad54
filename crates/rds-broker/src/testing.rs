//! In-memory fakes of the RDS and STS capabilities
//!
//! Used by unit tests and, through the `test-utils` feature, by the
//! integration tests under `tests/`. Both fakes record every call and can be
//! scripted to fail a named operation with a provider error code.

use crate::aws::error::ProviderError;
use crate::aws::rds::{
    ClusterSnapshot, CreateClusterInput, CreateInstanceInput, CreateSnapshotInput, DbCluster,
    DbInstance, DeleteInput, EngineVersion, InstanceSnapshot, ModifyClusterInput,
    ModifyInstanceInput, RdsOperations, RestoreClusterInput, RestoreInstanceInput, SnapshotQuery,
};
use crate::aws::sts::{AssumeRoleInput, AssumeRoleOperations, TemporaryCredentials};
use chrono::Utc;
use rds_broker_common::Tag;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const FAKE_ACCOUNT: &str = "123456789012";
pub const FAKE_REGION: &str = "us-east-1";

type Result<T> = std::result::Result<T, ProviderError>;

/// ARN the fake assigns to a resource of the given kind
pub fn fake_arn(kind: &str, id: &str) -> String {
    format!("arn:aws:rds:{FAKE_REGION}:{FAKE_ACCOUNT}:{kind}:{id}")
}

/// A recorded call against [`FakeRds`]
#[derive(Debug, Clone, PartialEq)]
pub enum RdsCall {
    DescribeCluster(String),
    DescribeClusters,
    CreateCluster(CreateClusterInput),
    ModifyCluster(ModifyClusterInput),
    DeleteCluster(DeleteInput),
    StartCluster(String),
    StopCluster(String),
    RestoreCluster(RestoreClusterInput),
    DescribeInstance(String),
    DescribeInstances,
    CreateInstance(CreateInstanceInput),
    ModifyInstance(ModifyInstanceInput),
    DeleteInstance(DeleteInput),
    StartInstance(String),
    StopInstance(String),
    RestoreInstance(RestoreInstanceInput),
    DescribeClusterSnapshots(SnapshotQuery),
    DescribeInstanceSnapshots(SnapshotQuery),
    CreateClusterSnapshot(CreateSnapshotInput),
    CreateInstanceSnapshot(CreateSnapshotInput),
    DeleteClusterSnapshot(String),
    DeleteInstanceSnapshot(String),
    ModifyInstanceSnapshot { id: String, engine_version: String },
    AddTags { arn: String, tags: Vec<Tag> },
    DescribeEngineVersions { engine: String, engine_version: Option<String> },
}

impl RdsCall {
    /// Name of the [`RdsOperations`] method this call went through
    pub fn name(&self) -> &'static str {
        match self {
            Self::DescribeCluster(_) => "describe_cluster",
            Self::DescribeClusters => "describe_clusters",
            Self::CreateCluster(_) => "create_cluster",
            Self::ModifyCluster(_) => "modify_cluster",
            Self::DeleteCluster(_) => "delete_cluster",
            Self::StartCluster(_) => "start_cluster",
            Self::StopCluster(_) => "stop_cluster",
            Self::RestoreCluster(_) => "restore_cluster_from_snapshot",
            Self::DescribeInstance(_) => "describe_instance",
            Self::DescribeInstances => "describe_instances",
            Self::CreateInstance(_) => "create_instance",
            Self::ModifyInstance(_) => "modify_instance",
            Self::DeleteInstance(_) => "delete_instance",
            Self::StartInstance(_) => "start_instance",
            Self::StopInstance(_) => "stop_instance",
            Self::RestoreInstance(_) => "restore_instance_from_snapshot",
            Self::DescribeClusterSnapshots(_) => "describe_cluster_snapshots",
            Self::DescribeInstanceSnapshots(_) => "describe_instance_snapshots",
            Self::CreateClusterSnapshot(_) => "create_cluster_snapshot",
            Self::CreateInstanceSnapshot(_) => "create_instance_snapshot",
            Self::DeleteClusterSnapshot(_) => "delete_cluster_snapshot",
            Self::DeleteInstanceSnapshot(_) => "delete_instance_snapshot",
            Self::ModifyInstanceSnapshot { .. } => "modify_instance_snapshot",
            Self::AddTags { .. } => "add_tags",
            Self::DescribeEngineVersions { .. } => "describe_engine_versions",
        }
    }

    /// Whether the call changes provider state
    pub fn is_mutating(&self) -> bool {
        !self.name().starts_with("describe_")
    }
}

#[derive(Default)]
struct RdsState {
    clusters: BTreeMap<String, DbCluster>,
    instances: BTreeMap<String, DbInstance>,
    cluster_snapshots: BTreeMap<String, ClusterSnapshot>,
    instance_snapshots: BTreeMap<String, InstanceSnapshot>,
    engine_versions: Vec<EngineVersion>,
    tags: HashMap<String, Vec<Tag>>,
    calls: Vec<RdsCall>,
    failures: HashMap<&'static str, ProviderError>,
    hangs: HashSet<&'static str>,
}

/// In-memory RDS account.
///
/// Resources change state synchronously: a deleted instance leaves its
/// cluster immediately, and a cluster with remaining members refuses to be
/// deleted, as RDS does.
pub struct FakeRds {
    state: Mutex<RdsState>,
}

impl Default for FakeRds {
    fn default() -> Self {
        let engine_versions = vec![
            engine_version("aurora-postgresql", "11.9", "aurora-postgresql11", &["12.9"]),
            engine_version("aurora-postgresql", "13.7", "aurora-postgresql13", &["14.3"]),
            engine_version("aurora-mysql", "5.7.mysql_aurora.2.11.2", "aurora-mysql5.7", &[]),
            engine_version("postgres", "14.5", "postgres14", &["15.3"]),
            engine_version("postgres", "15.3", "postgres15", &[]),
            engine_version("mysql", "8.0.32", "mysql8.0", &[]),
        ];
        Self {
            state: Mutex::new(RdsState {
                engine_versions,
                ..RdsState::default()
            }),
        }
    }
}

fn engine_version(engine: &str, version: &str, family: &str, targets: &[&str]) -> EngineVersion {
    EngineVersion {
        engine: engine.to_string(),
        engine_version: version.to_string(),
        db_parameter_group_family: Some(family.to_string()),
        valid_upgrade_target: targets.iter().map(|t| t.to_string()).collect(),
    }
}

/// A seeded cluster with no members
pub fn seeded_cluster(id: &str, engine: &str, engine_mode: &str) -> DbCluster {
    DbCluster {
        db_cluster_identifier: id.to_string(),
        db_cluster_arn: Some(fake_arn("cluster", id)),
        engine: Some(engine.to_string()),
        engine_mode: Some(engine_mode.to_string()),
        status: Some("available".to_string()),
        ..DbCluster::default()
    }
}

/// A seeded standalone instance
pub fn seeded_instance(id: &str, engine: &str) -> DbInstance {
    DbInstance {
        db_instance_identifier: id.to_string(),
        db_instance_arn: Some(fake_arn("db", id)),
        db_instance_class: Some("db.t3.medium".to_string()),
        engine: Some(engine.to_string()),
        status: Some("available".to_string()),
        ..DbInstance::default()
    }
}

/// A seeded manual cluster snapshot
pub fn seeded_cluster_snapshot(
    id: &str,
    cluster: &str,
    engine: &str,
    engine_version: &str,
    engine_mode: &str,
) -> ClusterSnapshot {
    ClusterSnapshot {
        snapshot_identifier: id.to_string(),
        snapshot_arn: Some(fake_arn("cluster-snapshot", id)),
        db_cluster_identifier: Some(cluster.to_string()),
        engine: Some(engine.to_string()),
        engine_mode: Some(engine_mode.to_string()),
        engine_version: Some(engine_version.to_string()),
        status: Some("available".to_string()),
        snapshot_type: Some("manual".to_string()),
        snapshot_create_time: None,
    }
}

/// A seeded manual instance snapshot
pub fn seeded_instance_snapshot(
    id: &str,
    instance: &str,
    engine: &str,
    engine_version: &str,
) -> InstanceSnapshot {
    InstanceSnapshot {
        snapshot_identifier: id.to_string(),
        snapshot_arn: Some(fake_arn("snapshot", id)),
        db_instance_identifier: Some(instance.to_string()),
        engine: Some(engine.to_string()),
        engine_version: Some(engine_version.to_string()),
        status: Some("available".to_string()),
        snapshot_type: Some("manual".to_string()),
        snapshot_create_time: None,
    }
}

fn not_found(code: &str, what: &str, id: &str) -> ProviderError {
    ProviderError::new(code, format!("{what} {id} not found."))
}

fn already_exists(code: &str, what: &str, id: &str) -> ProviderError {
    ProviderError::new(code, format!("{what} {id} already exists."))
}

impl FakeRds {
    fn lock(&self) -> MutexGuard<'_, RdsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_cluster(self, cluster: DbCluster) -> Self {
        self.lock()
            .clusters
            .insert(cluster.db_cluster_identifier.clone(), cluster);
        self
    }

    /// Add an instance, joining its cluster's member list when it has one
    pub fn with_instance(self, instance: DbInstance) -> Self {
        {
            let mut state = self.lock();
            if let Some(cluster_id) = &instance.db_cluster_identifier {
                if let Some(cluster) = state.clusters.get_mut(cluster_id) {
                    cluster.members.push(instance.db_instance_identifier.clone());
                }
            }
            state
                .instances
                .insert(instance.db_instance_identifier.clone(), instance);
        }
        self
    }

    pub fn with_cluster_snapshot(self, snapshot: ClusterSnapshot) -> Self {
        self.lock()
            .cluster_snapshots
            .insert(snapshot.snapshot_identifier.clone(), snapshot);
        self
    }

    pub fn with_instance_snapshot(self, snapshot: InstanceSnapshot) -> Self {
        self.lock()
            .instance_snapshots
            .insert(snapshot.snapshot_identifier.clone(), snapshot);
        self
    }

    pub fn with_engine_version(self, version: EngineVersion) -> Self {
        self.lock().engine_versions.push(version);
        self
    }

    /// Make every later call of `operation` fail with `err`
    pub fn fail_on(&self, operation: &'static str, err: ProviderError) {
        self.lock().failures.insert(operation, err);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Make every later call of `operation` never complete
    pub fn hang_on(&self, operation: &'static str) {
        self.lock().hangs.insert(operation);
    }

    pub fn calls(&self) -> Vec<RdsCall> {
        self.lock().calls.clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(RdsCall::name).collect()
    }

    pub fn mutating_calls(&self) -> Vec<RdsCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutating())
            .cloned()
            .collect()
    }

    pub fn cluster(&self, id: &str) -> Option<DbCluster> {
        self.lock().clusters.get(id).cloned()
    }

    pub fn instance(&self, id: &str) -> Option<DbInstance> {
        self.lock().instances.get(id).cloned()
    }

    pub fn cluster_snapshot(&self, id: &str) -> Option<ClusterSnapshot> {
        self.lock().cluster_snapshots.get(id).cloned()
    }

    pub fn instance_snapshot(&self, id: &str) -> Option<InstanceSnapshot> {
        self.lock().instance_snapshots.get(id).cloned()
    }

    /// Tags currently attached to `arn`
    pub fn tags_for(&self, arn: &str) -> Vec<Tag> {
        self.lock().tags.get(arn).cloned().unwrap_or_default()
    }

    /// Record the call, then apply any scripted hang or failure
    async fn enter(&self, call: RdsCall) -> Result<()> {
        let name = call.name();
        let (hang, failure) = {
            let mut state = self.lock();
            state.calls.push(call);
            (state.hangs.contains(name), state.failures.get(name).cloned())
        };
        if hang {
            std::future::pending::<()>().await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn merge_tags(existing: &mut Vec<Tag>, tags: &[Tag]) {
    for tag in tags {
        match existing.iter_mut().find(|t| t.key == tag.key) {
            Some(t) => t.value = tag.value.clone(),
            None => existing.push(tag.clone()),
        }
    }
}

impl RdsOperations for FakeRds {
    async fn describe_cluster(&self, id: &str) -> Result<DbCluster> {
        self.enter(RdsCall::DescribeCluster(id.to_string())).await?;
        self.cluster(id)
            .ok_or_else(|| not_found("DBClusterNotFoundFault", "DBCluster", id))
    }

    async fn describe_clusters(&self) -> Result<Vec<DbCluster>> {
        self.enter(RdsCall::DescribeClusters).await?;
        Ok(self.lock().clusters.values().cloned().collect())
    }

    async fn create_cluster(&self, input: &CreateClusterInput) -> Result<DbCluster> {
        self.enter(RdsCall::CreateCluster(input.clone())).await?;
        let id = &input.db_cluster_identifier;
        let mut state = self.lock();
        if state.clusters.contains_key(id) {
            return Err(already_exists("DBClusterAlreadyExistsFault", "DB Cluster", id));
        }
        let cluster = DbCluster {
            db_cluster_identifier: id.clone(),
            db_cluster_arn: Some(fake_arn("cluster", id)),
            engine: input.engine.clone(),
            engine_mode: Some(
                input
                    .engine_mode
                    .clone()
                    .unwrap_or_else(|| "provisioned".to_string()),
            ),
            engine_version: input.engine_version.clone(),
            status: Some("creating".to_string()),
            port: input.port,
            db_cluster_parameter_group: input.db_cluster_parameter_group_name.clone(),
            ..DbCluster::default()
        };
        state.tags.insert(fake_arn("cluster", id), input.tags.clone());
        state.clusters.insert(id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn modify_cluster(&self, input: &ModifyClusterInput) -> Result<DbCluster> {
        self.enter(RdsCall::ModifyCluster(input.clone())).await?;
        let id = &input.db_cluster_identifier;
        let mut state = self.lock();
        let cluster = state
            .clusters
            .get_mut(id)
            .ok_or_else(|| not_found("DBClusterNotFoundFault", "DBCluster", id))?;
        if input.engine_version.is_some() {
            cluster.engine_version = input.engine_version.clone();
        }
        if input.db_cluster_parameter_group_name.is_some() {
            cluster.db_cluster_parameter_group = input.db_cluster_parameter_group_name.clone();
        }
        cluster.status = Some("modifying".to_string());
        Ok(cluster.clone())
    }

    async fn delete_cluster(&self, input: &DeleteInput) -> Result<DbCluster> {
        self.enter(RdsCall::DeleteCluster(input.clone())).await?;
        let id = &input.identifier;
        let mut state = self.lock();
        let cluster = state
            .clusters
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("DBClusterNotFoundFault", "DBCluster", id))?;
        if !cluster.members.is_empty() {
            return Err(ProviderError::new(
                "InvalidDBClusterStateFault",
                "Cluster cannot be deleted, it still contains DB instances in non-deleting state.",
            ));
        }
        if let Some(final_id) = &input.final_snapshot_identifier {
            let snapshot = ClusterSnapshot {
                snapshot_identifier: final_id.clone(),
                snapshot_arn: Some(fake_arn("cluster-snapshot", final_id)),
                db_cluster_identifier: Some(id.clone()),
                engine: cluster.engine.clone(),
                engine_mode: cluster.engine_mode.clone(),
                engine_version: cluster.engine_version.clone(),
                status: Some("creating".to_string()),
                snapshot_type: Some("manual".to_string()),
                snapshot_create_time: None,
            };
            state.cluster_snapshots.insert(final_id.clone(), snapshot);
        }
        state.clusters.remove(id);
        Ok(DbCluster {
            status: Some("deleting".to_string()),
            ..cluster
        })
    }

    async fn start_cluster(&self, id: &str) -> Result<DbCluster> {
        self.enter(RdsCall::StartCluster(id.to_string())).await?;
        let mut state = self.lock();
        let cluster = state
            .clusters
            .get_mut(id)
            .ok_or_else(|| not_found("DBClusterNotFoundFault", "DBCluster", id))?;
        cluster.status = Some("starting".to_string());
        Ok(cluster.clone())
    }

    async fn stop_cluster(&self, id: &str) -> Result<DbCluster> {
        self.enter(RdsCall::StopCluster(id.to_string())).await?;
        let mut state = self.lock();
        let cluster = state
            .clusters
            .get_mut(id)
            .ok_or_else(|| not_found("DBClusterNotFoundFault", "DBCluster", id))?;
        cluster.status = Some("stopping".to_string());
        Ok(cluster.clone())
    }

    async fn restore_cluster_from_snapshot(&self, input: &RestoreClusterInput) -> Result<DbCluster> {
        self.enter(RdsCall::RestoreCluster(input.clone())).await?;
        let id = &input.db_cluster_identifier;
        let mut state = self.lock();
        if !state.cluster_snapshots.contains_key(&input.snapshot_identifier) {
            return Err(not_found(
                "DBClusterSnapshotNotFoundFault",
                "DBClusterSnapshot",
                &input.snapshot_identifier,
            ));
        }
        if state.clusters.contains_key(id) {
            return Err(already_exists("DBClusterAlreadyExistsFault", "DB Cluster", id));
        }
        let cluster = DbCluster {
            db_cluster_identifier: id.clone(),
            db_cluster_arn: Some(fake_arn("cluster", id)),
            engine: Some(input.engine.clone()),
            engine_mode: input.engine_mode.clone(),
            engine_version: input.engine_version.clone(),
            status: Some("creating".to_string()),
            port: input.port,
            db_cluster_parameter_group: input.db_cluster_parameter_group_name.clone(),
            ..DbCluster::default()
        };
        state.tags.insert(fake_arn("cluster", id), input.tags.clone());
        state.clusters.insert(id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn describe_instance(&self, id: &str) -> Result<DbInstance> {
        self.enter(RdsCall::DescribeInstance(id.to_string())).await?;
        self.instance(id)
            .ok_or_else(|| not_found("DBInstanceNotFound", "DBInstance", id))
    }

    async fn describe_instances(&self) -> Result<Vec<DbInstance>> {
        self.enter(RdsCall::DescribeInstances).await?;
        Ok(self.lock().instances.values().cloned().collect())
    }

    async fn create_instance(&self, input: &CreateInstanceInput) -> Result<DbInstance> {
        self.enter(RdsCall::CreateInstance(input.clone())).await?;
        let id = &input.db_instance_identifier;
        let mut state = self.lock();
        if state.instances.contains_key(id) {
            return Err(already_exists("DBInstanceAlreadyExists", "DB instance", id));
        }
        if let Some(cluster_id) = &input.db_cluster_identifier {
            let cluster = state
                .clusters
                .get_mut(cluster_id)
                .ok_or_else(|| not_found("DBClusterNotFoundFault", "DBCluster", cluster_id))?;
            cluster.members.push(id.clone());
        }
        let instance = DbInstance {
            db_instance_identifier: id.clone(),
            db_instance_arn: Some(fake_arn("db", id)),
            db_instance_class: input.db_instance_class.clone(),
            db_cluster_identifier: input.db_cluster_identifier.clone(),
            engine: input.engine.clone(),
            engine_version: input.engine_version.clone(),
            status: Some("creating".to_string()),
            port: input.port,
            ..DbInstance::default()
        };
        state.tags.insert(fake_arn("db", id), input.tags.clone());
        state.instances.insert(id.clone(), instance.clone());
        Ok(instance)
    }

    async fn modify_instance(&self, input: &ModifyInstanceInput) -> Result<DbInstance> {
        self.enter(RdsCall::ModifyInstance(input.clone())).await?;
        let id = &input.db_instance_identifier;
        let mut state = self.lock();
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| not_found("DBInstanceNotFound", "DBInstance", id))?;
        if input.engine_version.is_some() {
            instance.engine_version = input.engine_version.clone();
        }
        if input.db_instance_class.is_some() {
            instance.db_instance_class = input.db_instance_class.clone();
        }
        instance.status = Some("modifying".to_string());
        Ok(instance.clone())
    }

    async fn delete_instance(&self, input: &DeleteInput) -> Result<DbInstance> {
        self.enter(RdsCall::DeleteInstance(input.clone())).await?;
        let id = &input.identifier;
        let mut state = self.lock();
        let instance = state
            .instances
            .remove(id)
            .ok_or_else(|| not_found("DBInstanceNotFound", "DBInstance", id))?;
        if let Some(cluster_id) = &instance.db_cluster_identifier {
            if let Some(cluster) = state.clusters.get_mut(cluster_id) {
                cluster.members.retain(|m| m != id);
            }
        }
        if let Some(final_id) = &input.final_snapshot_identifier {
            let snapshot = InstanceSnapshot {
                snapshot_identifier: final_id.clone(),
                snapshot_arn: Some(fake_arn("snapshot", final_id)),
                db_instance_identifier: Some(id.clone()),
                engine: instance.engine.clone(),
                engine_version: instance.engine_version.clone(),
                status: Some("creating".to_string()),
                snapshot_type: Some("manual".to_string()),
                snapshot_create_time: None,
            };
            state.instance_snapshots.insert(final_id.clone(), snapshot);
        }
        Ok(DbInstance {
            status: Some("deleting".to_string()),
            ..instance
        })
    }

    async fn start_instance(&self, id: &str) -> Result<DbInstance> {
        self.enter(RdsCall::StartInstance(id.to_string())).await?;
        let mut state = self.lock();
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| not_found("DBInstanceNotFound", "DBInstance", id))?;
        instance.status = Some("starting".to_string());
        Ok(instance.clone())
    }

    async fn stop_instance(&self, id: &str) -> Result<DbInstance> {
        self.enter(RdsCall::StopInstance(id.to_string())).await?;
        let mut state = self.lock();
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| not_found("DBInstanceNotFound", "DBInstance", id))?;
        instance.status = Some("stopping".to_string());
        Ok(instance.clone())
    }

    async fn restore_instance_from_snapshot(
        &self,
        input: &RestoreInstanceInput,
    ) -> Result<DbInstance> {
        self.enter(RdsCall::RestoreInstance(input.clone())).await?;
        let id = &input.db_instance_identifier;
        let mut state = self.lock();
        let snapshot = state
            .instance_snapshots
            .get(&input.db_snapshot_identifier)
            .cloned()
            .ok_or_else(|| {
                not_found("DBSnapshotNotFound", "DBSnapshot", &input.db_snapshot_identifier)
            })?;
        if state.instances.contains_key(id) {
            return Err(already_exists("DBInstanceAlreadyExists", "DB instance", id));
        }
        let instance = DbInstance {
            db_instance_identifier: id.clone(),
            db_instance_arn: Some(fake_arn("db", id)),
            db_instance_class: input.db_instance_class.clone(),
            engine: input.engine.clone().or(snapshot.engine),
            engine_version: snapshot.engine_version,
            status: Some("creating".to_string()),
            port: input.port,
            ..DbInstance::default()
        };
        state.tags.insert(fake_arn("db", id), input.tags.clone());
        state.instances.insert(id.clone(), instance.clone());
        Ok(instance)
    }

    async fn describe_cluster_snapshots(&self, query: &SnapshotQuery) -> Result<Vec<ClusterSnapshot>> {
        self.enter(RdsCall::DescribeClusterSnapshots(query.clone()))
            .await?;
        let state = self.lock();
        match query {
            SnapshotQuery::ById(id) => state
                .cluster_snapshots
                .get(id)
                .map(|s| vec![s.clone()])
                .ok_or_else(|| {
                    not_found("DBClusterSnapshotNotFoundFault", "DBClusterSnapshot", id)
                }),
            SnapshotQuery::OfSource(cluster) => Ok(state
                .cluster_snapshots
                .values()
                .filter(|s| s.db_cluster_identifier.as_deref() == Some(cluster.as_str()))
                .cloned()
                .collect()),
            SnapshotQuery::AllManual => Ok(state
                .cluster_snapshots
                .values()
                .filter(|s| s.snapshot_type.as_deref() == Some("manual"))
                .cloned()
                .collect()),
        }
    }

    async fn describe_instance_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Vec<InstanceSnapshot>> {
        self.enter(RdsCall::DescribeInstanceSnapshots(query.clone()))
            .await?;
        let state = self.lock();
        match query {
            SnapshotQuery::ById(id) => state
                .instance_snapshots
                .get(id)
                .map(|s| vec![s.clone()])
                .ok_or_else(|| not_found("DBSnapshotNotFound", "DBSnapshot", id)),
            SnapshotQuery::OfSource(instance) => Ok(state
                .instance_snapshots
                .values()
                .filter(|s| s.db_instance_identifier.as_deref() == Some(instance.as_str()))
                .cloned()
                .collect()),
            SnapshotQuery::AllManual => Ok(state
                .instance_snapshots
                .values()
                .filter(|s| s.snapshot_type.as_deref() == Some("manual"))
                .cloned()
                .collect()),
        }
    }

    async fn create_cluster_snapshot(&self, input: &CreateSnapshotInput) -> Result<ClusterSnapshot> {
        self.enter(RdsCall::CreateClusterSnapshot(input.clone()))
            .await?;
        let id = &input.snapshot_identifier;
        let mut state = self.lock();
        let cluster = state
            .clusters
            .get(&input.source_identifier)
            .cloned()
            .ok_or_else(|| {
                not_found("DBClusterNotFoundFault", "DBCluster", &input.source_identifier)
            })?;
        if state.cluster_snapshots.contains_key(id) {
            return Err(already_exists(
                "DBClusterSnapshotAlreadyExistsFault",
                "Cluster snapshot",
                id,
            ));
        }
        let snapshot = ClusterSnapshot {
            snapshot_identifier: id.clone(),
            snapshot_arn: Some(fake_arn("cluster-snapshot", id)),
            db_cluster_identifier: Some(cluster.db_cluster_identifier),
            engine: cluster.engine,
            engine_mode: cluster.engine_mode,
            engine_version: cluster.engine_version,
            status: Some("creating".to_string()),
            snapshot_type: Some("manual".to_string()),
            snapshot_create_time: Some(Utc::now()),
        };
        state
            .tags
            .insert(fake_arn("cluster-snapshot", id), input.tags.clone());
        state.cluster_snapshots.insert(id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn create_instance_snapshot(
        &self,
        input: &CreateSnapshotInput,
    ) -> Result<InstanceSnapshot> {
        self.enter(RdsCall::CreateInstanceSnapshot(input.clone()))
            .await?;
        let id = &input.snapshot_identifier;
        let mut state = self.lock();
        let instance = state
            .instances
            .get(&input.source_identifier)
            .cloned()
            .ok_or_else(|| {
                not_found("DBInstanceNotFound", "DBInstance", &input.source_identifier)
            })?;
        if state.instance_snapshots.contains_key(id) {
            return Err(already_exists("DBSnapshotAlreadyExists", "Snapshot", id));
        }
        let snapshot = InstanceSnapshot {
            snapshot_identifier: id.clone(),
            snapshot_arn: Some(fake_arn("snapshot", id)),
            db_instance_identifier: Some(instance.db_instance_identifier),
            engine: instance.engine,
            engine_version: instance.engine_version,
            status: Some("creating".to_string()),
            snapshot_type: Some("manual".to_string()),
            snapshot_create_time: Some(Utc::now()),
        };
        state.tags.insert(fake_arn("snapshot", id), input.tags.clone());
        state.instance_snapshots.insert(id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn delete_cluster_snapshot(&self, id: &str) -> Result<ClusterSnapshot> {
        self.enter(RdsCall::DeleteClusterSnapshot(id.to_string()))
            .await?;
        let snapshot = self
            .lock()
            .cluster_snapshots
            .remove(id)
            .ok_or_else(|| not_found("DBClusterSnapshotNotFoundFault", "DBClusterSnapshot", id))?;
        Ok(ClusterSnapshot {
            status: Some("deleted".to_string()),
            ..snapshot
        })
    }

    async fn delete_instance_snapshot(&self, id: &str) -> Result<InstanceSnapshot> {
        self.enter(RdsCall::DeleteInstanceSnapshot(id.to_string()))
            .await?;
        let snapshot = self
            .lock()
            .instance_snapshots
            .remove(id)
            .ok_or_else(|| not_found("DBSnapshotNotFound", "DBSnapshot", id))?;
        Ok(InstanceSnapshot {
            status: Some("deleted".to_string()),
            ..snapshot
        })
    }

    async fn modify_instance_snapshot(
        &self,
        id: &str,
        engine_version: &str,
    ) -> Result<InstanceSnapshot> {
        self.enter(RdsCall::ModifyInstanceSnapshot {
            id: id.to_string(),
            engine_version: engine_version.to_string(),
        })
        .await?;
        let mut state = self.lock();
        let snapshot = state
            .instance_snapshots
            .get_mut(id)
            .ok_or_else(|| not_found("DBSnapshotNotFound", "DBSnapshot", id))?;
        snapshot.engine_version = Some(engine_version.to_string());
        Ok(snapshot.clone())
    }

    async fn add_tags(&self, arn: &str, tags: &[Tag]) -> Result<()> {
        self.enter(RdsCall::AddTags {
            arn: arn.to_string(),
            tags: tags.to_vec(),
        })
        .await?;
        let mut state = self.lock();
        merge_tags(state.tags.entry(arn.to_string()).or_default(), tags);
        Ok(())
    }

    async fn describe_engine_versions(
        &self,
        engine: &str,
        engine_version: Option<&str>,
    ) -> Result<Vec<EngineVersion>> {
        self.enter(RdsCall::DescribeEngineVersions {
            engine: engine.to_string(),
            engine_version: engine_version.map(str::to_string),
        })
        .await?;
        Ok(self
            .lock()
            .engine_versions
            .iter()
            .filter(|v| v.engine == engine)
            .filter(|v| engine_version.is_none_or(|ver| v.engine_version == ver))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct StsState {
    calls: Vec<AssumeRoleInput>,
    failure: Option<ProviderError>,
    hang: bool,
}

/// In-memory STS that hands out distinct credentials on every call
#[derive(Default)]
pub struct FakeSts {
    state: Mutex<StsState>,
    issued: AtomicUsize,
}

impl FakeSts {
    fn lock(&self) -> MutexGuard<'_, StsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<AssumeRoleInput> {
        self.lock().calls.clone()
    }

    /// Make every later assume-role call fail with `err`
    pub fn fail_with(&self, err: ProviderError) {
        self.lock().failure = Some(err);
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// Make every later assume-role call wait forever
    pub fn hang(&self) {
        self.lock().hang = true;
    }
}

impl AssumeRoleOperations for FakeSts {
    async fn assume_role(&self, input: AssumeRoleInput) -> Result<TemporaryCredentials> {
        let (hang, failure) = {
            let mut state = self.lock();
            state.calls.push(input.clone());
            (state.hang, state.failure.clone())
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let n = self.issued.fetch_add(1, Ordering::Relaxed);
        Ok(TemporaryCredentials {
            access_key_id: format!("ASIAFAKE{n:012}"),
            secret_access_key: format!("fake-secret-{n}"),
            session_token: format!("fake-token-{n}"),
            expiration: Utc::now() + chrono::Duration::seconds(i64::from(input.duration_secs)),
        })
    }
}
