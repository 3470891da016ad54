//! RDS database, cluster and snapshot management

mod cluster;
mod instance;
mod operations;
mod snapshot;
pub mod types;

pub use operations::RdsOperations;
pub use types::{
    ClusterSnapshot, CreateClusterInput, CreateInstanceInput, CreateSnapshotInput, DbCluster,
    DbInstance, DeleteInput, EngineVersion, InstanceSnapshot, ModifyClusterInput,
    ModifyInstanceInput, RestoreClusterInput, RestoreInstanceInput, ScalingConfiguration,
    SnapshotQuery,
};

use crate::aws::context::AwsContext;
use crate::aws::error::ProviderError;
use aws_sdk_rds::Client;
use aws_sdk_rds::primitives::DateTime as SdkDateTime;
use chrono::{DateTime, Utc};
use rds_broker_common::Tag;

/// RDS client bound to one tenant session
pub struct RdsClient {
    pub(crate) client: Client,
}

impl RdsClient {
    /// Create an RDS client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.rds_client(),
        }
    }

    pub async fn add_tags(&self, arn: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        self.client
            .add_tags_to_resource()
            .resource_name(arn)
            .set_tags(to_sdk_tags(tags))
            .send()
            .await?;
        Ok(())
    }

    pub async fn describe_engine_versions(
        &self,
        engine: &str,
        engine_version: Option<&str>,
    ) -> Result<Vec<EngineVersion>, ProviderError> {
        let versions = self
            .client
            .describe_db_engine_versions()
            .engine(engine)
            .set_engine_version(engine_version.map(str::to_string))
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await?;

        Ok(versions
            .iter()
            .map(|v| EngineVersion {
                engine: v.engine().unwrap_or_default().to_string(),
                engine_version: v.engine_version().unwrap_or_default().to_string(),
                db_parameter_group_family: v.db_parameter_group_family().map(str::to_string),
                valid_upgrade_target: v
                    .valid_upgrade_target()
                    .iter()
                    .filter_map(|t| t.engine_version().map(str::to_string))
                    .collect(),
            })
            .collect())
    }
}

/// Error for a response that lacks the resource it should describe
fn missing(what: &str) -> ProviderError {
    ProviderError::local(format!("RDS response did not include {what}"))
}

fn to_sdk_tags(tags: &[Tag]) -> Option<Vec<aws_sdk_rds::types::Tag>> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.iter()
            .map(|t| {
                aws_sdk_rds::types::Tag::builder()
                    .key(&t.key)
                    .value(&t.value)
                    .build()
            })
            .collect(),
    )
}

fn to_sdk_scaling(
    config: Option<&ScalingConfiguration>,
) -> Option<aws_sdk_rds::types::ScalingConfiguration> {
    config.map(|c| {
        aws_sdk_rds::types::ScalingConfiguration::builder()
            .set_auto_pause(c.auto_pause)
            .set_max_capacity(c.max_capacity)
            .set_min_capacity(c.min_capacity)
            .set_seconds_until_auto_pause(c.seconds_until_auto_pause)
            .set_timeout_action(c.timeout_action.clone())
            .build()
    })
}

/// `None` for an empty list so the SDK omits the parameter
fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn to_chrono(t: Option<&SdkDateTime>) -> Option<DateTime<Utc>> {
    t.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string)
}
