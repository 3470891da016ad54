//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once and creating
//! service clients from it. The broker's own identity uses
//! [`AwsContext::new`]; tenant-scoped clients are built from an assumed
//! [`Session`] with [`AwsContext::from_session`].

use crate::aws::session::Session;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_rds::config::Credentials;
use std::sync::Arc;

/// Provider name recorded on credentials built from an assumed session
const SESSION_PROVIDER_NAME: &str = "rds-broker-session";

/// Shared AWS configuration context for creating service clients.
///
/// # Example
/// ```ignore
/// let aws = AwsContext::new("us-east-1").await;
/// let sts = StsClient::from_context(&aws);
///
/// let session = broker.assume(&ctx, &request).await?;
/// let tenant_aws = AwsContext::from_session("us-east-1", &session).await;
/// let rds = RdsClient::from_context(&tenant_aws);
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load AWS configuration for the specified region.
    ///
    /// Credentials come from the environment, config files, or an instance
    /// role, following the SDK's default provider chain.
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    /// Build a context whose clients act with the assumed session's credentials.
    pub async fn from_session(region: &str, session: &Session) -> Self {
        let credentials = Credentials::new(
            session.access_key_id(),
            session.secret_access_key(),
            Some(session.session_token().to_string()),
            Some(session.expiration().into()),
            SESSION_PROVIDER_NAME,
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .load()
            .await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Get the region string.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Create an RDS client from this context.
    pub fn rds_client(&self) -> aws_sdk_rds::Client {
        aws_sdk_rds::Client::new(self.sdk_config())
    }

    /// Create an STS client from this context.
    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(self.sdk_config())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
