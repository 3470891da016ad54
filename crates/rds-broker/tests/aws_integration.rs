//! Integration tests against a live AWS account
//!
//! These tests require AWS credentials with RDS read access and are ignored by
//! default. They only describe resources and never create any.
//! Run with: AWS_PROFILE=sandbox cargo nextest run --test aws_integration --run-ignored all

use rds_broker::aws::{AwsContext, RdsClient, RoleRequest, SessionBroker, StsClient};
use rds_broker::orchestrator::{
    CallContext, DatabaseOrchestrator, ParameterGroupKind, ParameterGroupResolver,
    ProvisioningDefaults, TenantContext,
};
use rds_broker_common::policy::READ_ONLY_MANAGED_POLICY;
use rds_broker_common::{ErrorKind, Operation, role_arn};
use rds_broker_test_utils::aws::{get_test_account, get_test_region, test_identifier};
use std::sync::Arc;

async fn rds() -> RdsClient {
    let aws = AwsContext::new(&get_test_region()).await;
    RdsClient::from_context(&aws)
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_describe_engine_versions_has_families() {
    let rds = rds().await;

    let versions = rds
        .describe_engine_versions("postgres", None)
        .await
        .expect("describe engine versions");

    assert!(!versions.is_empty());
    assert!(
        versions
            .iter()
            .all(|v| v.db_parameter_group_family.as_deref().is_some_and(|f| f.starts_with("postgres")))
    );
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_resolves_family_for_live_engine() {
    let rds = rds().await;
    let tenant = TenantContext::new("integration", ProvisioningDefaults::default());

    let group = ParameterGroupResolver::new(&rds, &tenant)
        .default_group(
            &CallContext::default(),
            ParameterGroupKind::Cluster,
            Some("aurora-postgresql"),
            None,
        )
        .await
        .expect("family resolution");

    // No configured defaults, so the provider default applies
    assert_eq!(group, None);
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_unknown_database_is_not_found() {
    let rds = rds().await;
    let tenant = TenantContext::new("integration", ProvisioningDefaults::default());
    let orchestrator = DatabaseOrchestrator::new(&rds, &tenant);
    let ctx = CallContext::default();
    let id = test_identifier();

    let err = orchestrator.get(&ctx, &id, true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = orchestrator.resolve_arn(&ctx, &id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let response = orchestrator.delete(&ctx, &id, false).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_list_databases() {
    let rds = rds().await;
    let tenant = TenantContext::new("integration", ProvisioningDefaults::default());

    let list = DatabaseOrchestrator::new(&rds, &tenant)
        .list(&CallContext::default(), true)
        .await
        .expect("list databases");

    assert!(list.clusters.is_some());
}

#[tokio::test]
#[ignore = "requires AWS credentials and RDS_BROKER_TEST_ACCOUNT"]
async fn test_assumed_session_is_cached_and_usable() {
    let Some(account) = get_test_account() else {
        eprintln!("RDS_BROKER_TEST_ACCOUNT not set, skipping");
        return;
    };
    let role_name =
        std::env::var("RDS_BROKER_TEST_ROLE").unwrap_or_else(|_| "SpinupRdsBroker".to_string());
    let region = get_test_region();

    let aws = AwsContext::new(&region).await;
    let broker = SessionBroker::new(StsClient::from_context(&aws), "integration");
    let request = RoleRequest::new(role_arn(&account, &role_name))
        .with_inline_policy(Operation::DatabaseRead.policy())
        .with_managed_policy_arns([READ_ONLY_MANAGED_POLICY]);

    let ctx = CallContext::default();
    let first = broker.assume(&ctx, &request).await.expect("assume role");
    let second = broker.assume(&ctx, &request).await.expect("cached session");
    assert!(Arc::ptr_eq(&first, &second));

    let tenant_aws = AwsContext::from_session(&region, &first).await;
    let rds = RdsClient::from_context(&tenant_aws);
    let tenant = TenantContext::new("integration", ProvisioningDefaults::default());
    DatabaseOrchestrator::new(&rds, &tenant)
        .list(&ctx, false)
        .await
        .expect("list with scoped session");
}
