//! Cross-account role assumption via STS

use crate::aws::context::AwsContext;
use crate::aws::error::ProviderError;
use aws_sdk_sts::Client;
use aws_sdk_sts::types::PolicyDescriptorType;
use chrono::{DateTime, Utc};
use rds_broker_common::Tag;
use std::future::Future;

/// Parameters of a single AssumeRole call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleInput {
    pub role_arn: String,
    pub external_id: Option<String>,
    pub session_name: String,
    pub duration_secs: i32,
    pub tags: Vec<Tag>,
    pub policy: Option<String>,
    pub policy_arns: Vec<String>,
}

/// Temporary credentials returned by AssumeRole
#[derive(Clone)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl std::fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Trait for the assume-role capability so the session broker can be
/// exercised without STS.
pub trait AssumeRoleOperations: Send + Sync {
    fn assume_role(
        &self,
        input: AssumeRoleInput,
    ) -> impl Future<Output = Result<TemporaryCredentials, ProviderError>> + Send;
}

/// STS client used by the broker's own identity
pub struct StsClient {
    client: Client,
}

impl StsClient {
    /// Create an STS client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.sts_client(),
        }
    }
}

impl AssumeRoleOperations for StsClient {
    async fn assume_role(
        &self,
        input: AssumeRoleInput,
    ) -> Result<TemporaryCredentials, ProviderError> {
        let mut request = self
            .client
            .assume_role()
            .role_arn(&input.role_arn)
            .role_session_name(&input.session_name)
            .duration_seconds(input.duration_secs)
            .set_external_id(input.external_id.clone())
            .set_policy(input.policy.clone());

        for arn in &input.policy_arns {
            request = request.policy_arns(PolicyDescriptorType::builder().arn(arn).build());
        }

        for tag in &input.tags {
            let sts_tag = aws_sdk_sts::types::Tag::builder()
                .key(&tag.key)
                .value(&tag.value)
                .build()
                .map_err(|e| ProviderError::local(format!("Failed to build STS tag: {e}")))?;
            request = request.tags(sts_tag);
        }

        let output = request.send().await?;

        let creds = output
            .credentials()
            .ok_or_else(|| ProviderError::local("No credentials returned from STS AssumeRole"))?;

        let expiration = creds.expiration();
        let expiration = DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .ok_or_else(|| ProviderError::local("STS returned an out-of-range expiration"))?;

        Ok(TemporaryCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration,
        })
    }
}
