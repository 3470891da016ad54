//! Parameter-group family resolution and tenant defaults

use super::context::CallContext;
use super::tenant::TenantContext;
use crate::aws::error::ApiError;
use crate::aws::rds::RdsOperations;
use tracing::{debug, info};

/// Which default-group table to consult
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterGroupKind {
    Cluster,
    Instance,
}

/// Looks up the tenant's default parameter group for an engine/version
pub struct ParameterGroupResolver<'a, R> {
    rds: &'a R,
    tenant: &'a TenantContext,
}

impl<'a, R: RdsOperations> ParameterGroupResolver<'a, R> {
    pub fn new(rds: &'a R, tenant: &'a TenantContext) -> Self {
        Self { rds, tenant }
    }

    /// The parameter-group family for `engine` at `engine_version`,
    /// e.g. "postgres14" for postgres 14.5.
    pub async fn family(
        &self,
        ctx: &CallContext,
        engine: &str,
        engine_version: Option<&str>,
    ) -> Result<String, ApiError> {
        let versions = ctx
            .run(self.rds.describe_engine_versions(engine, engine_version))
            .await
            .map_err(|e| ApiError::from_provider("failed to describe engine versions", e))?;

        versions
            .into_iter()
            .next()
            .and_then(|v| v.db_parameter_group_family)
            .ok_or_else(|| {
                ApiError::bad_request(format!(
                    "unable to find any matching database engine/version: {engine} {}",
                    engine_version.unwrap_or("(any)")
                ))
            })
    }

    /// The tenant's configured group for this engine's family, if any.
    ///
    /// `None` means the provider default applies. Without an engine there is
    /// no family to resolve and the provider default applies as well.
    pub async fn default_group(
        &self,
        ctx: &CallContext,
        kind: ParameterGroupKind,
        engine: Option<&str>,
        engine_version: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let Some(engine) = engine.filter(|e| !e.is_empty()) else {
            debug!(?kind, "No engine given, using provider default parameter group");
            return Ok(None);
        };

        let family = self.family(ctx, engine, engine_version).await?;
        info!(%family, engine, "Determined parameter group family");

        let defaults = match kind {
            ParameterGroupKind::Cluster => &self.tenant.defaults.cluster_parameter_groups,
            ParameterGroupKind::Instance => &self.tenant.defaults.db_parameter_groups,
        };

        match defaults.get(&family) {
            Some(group) => {
                info!(%family, group = %group, ?kind, "Using configured default parameter group");
                Ok(Some(group.clone()))
            }
            None => {
                info!(%family, ?kind, "No configured default parameter group, using provider default");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tenant::ProvisioningDefaults;
    use crate::testing::{FakeRds, RdsCall};
    use rds_broker_common::ErrorKind;

    fn tenant() -> TenantContext {
        TenantContext::new(
            "acme",
            ProvisioningDefaults {
                db_parameter_groups: [("postgres14".to_string(), "acme-pg14".to_string())].into(),
                cluster_parameter_groups: [(
                    "aurora-postgresql13".to_string(),
                    "acme-aurora-pg13".to_string(),
                )]
                .into(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn resolves_family_from_engine_version() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let resolver = ParameterGroupResolver::new(&rds, &tenant);
        let ctx = CallContext::default();

        let family = resolver.family(&ctx, "postgres", Some("14.5")).await.unwrap();
        assert_eq!(family, "postgres14");
        assert_eq!(
            rds.calls(),
            vec![RdsCall::DescribeEngineVersions {
                engine: "postgres".to_string(),
                engine_version: Some("14.5".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn applies_configured_default_per_kind() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let resolver = ParameterGroupResolver::new(&rds, &tenant);
        let ctx = CallContext::default();

        let instance = resolver
            .default_group(&ctx, ParameterGroupKind::Instance, Some("postgres"), Some("14.5"))
            .await
            .unwrap();
        assert_eq!(instance.as_deref(), Some("acme-pg14"));

        let cluster = resolver
            .default_group(
                &ctx,
                ParameterGroupKind::Cluster,
                Some("aurora-postgresql"),
                Some("13.7"),
            )
            .await
            .unwrap();
        assert_eq!(cluster.as_deref(), Some("acme-aurora-pg13"));
    }

    #[tokio::test]
    async fn missing_default_is_not_an_error() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let resolver = ParameterGroupResolver::new(&rds, &tenant);

        let group = resolver
            .default_group(
                &CallContext::default(),
                ParameterGroupKind::Instance,
                Some("postgres"),
                Some("15.3"),
            )
            .await
            .unwrap();
        assert_eq!(group, None);
    }

    #[tokio::test]
    async fn unknown_engine_version_is_bad_request() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let resolver = ParameterGroupResolver::new(&rds, &tenant);

        let err = resolver
            .family(&CallContext::default(), "postgres", Some("9.1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn no_engine_skips_lookup() {
        let rds = FakeRds::default();
        let tenant = tenant();
        let resolver = ParameterGroupResolver::new(&rds, &tenant);

        let group = resolver
            .default_group(&CallContext::default(), ParameterGroupKind::Cluster, None, None)
            .await
            .unwrap();
        assert_eq!(group, None);
        assert!(rds.calls().is_empty());
    }
}
