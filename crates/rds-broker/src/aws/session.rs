//! Cross-account session broker
//!
//! Exchanges the broker's own identity for short-lived, least-privilege
//! credentials in a tenant account. Sessions live for
//! [`SESSION_DURATION_SECS`] and are served from an in-memory cache for
//! [`SESSION_CACHE_TTL_SECS`], so a cached session always has a few minutes
//! of validity left when an orchestration starts using it.
//!
//! Concurrent misses on the same key each assume the role; the last insert
//! wins.

use crate::aws::error::{ApiError, ProviderError};
use crate::aws::sts::{AssumeRoleInput, AssumeRoleOperations, TemporaryCredentials};
use crate::orchestrator::CallContext;
use chrono::{DateTime, Utc};
use rds_broker_common::defaults::{
    MAX_SESSION_NAME_LEN, SESSION_CACHE_TTL_SECS, SESSION_DURATION_SECS,
};
use rds_broker_common::{ErrorKind, Tag};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What to assume: the role plus everything that narrows its permissions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRequest {
    pub role_arn: String,
    pub external_id: Option<String>,
    pub inline_policy: Option<String>,
    pub managed_policy_arns: Vec<String>,
}

impl RoleRequest {
    pub fn new(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            ..Default::default()
        }
    }

    /// Set the external ID; an empty string means none
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = non_empty(external_id.into());
        self
    }

    /// Set the inline session policy; an empty string means none
    pub fn with_inline_policy(mut self, policy: impl Into<String>) -> Self {
        self.inline_policy = non_empty(policy.into());
        self
    }

    pub fn with_managed_policy_arns<I, S>(mut self, arns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.managed_policy_arns = arns.into_iter().map(Into::into).collect();
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Cache key for an assumed session.
///
/// Every input that changes the effective permission boundary is part of the
/// key. Managed policy ARNs are sorted so their order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    org: String,
    role_arn: String,
    external_id: Option<String>,
    inline_policy: Option<String>,
    managed_policy_arns: Vec<String>,
}

impl SessionKey {
    pub fn new(org: &str, request: &RoleRequest) -> Self {
        let mut managed_policy_arns = request.managed_policy_arns.clone();
        managed_policy_arns.sort();
        Self {
            org: org.to_string(),
            role_arn: request.role_arn.clone(),
            external_id: request.external_id.clone(),
            inline_policy: request.inline_policy.clone(),
            managed_policy_arns,
        }
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }
}

/// Temporary credentials for one tenant role, plus the key that produced them
#[derive(Debug)]
pub struct Session {
    credentials: TemporaryCredentials,
    key: SessionKey,
}

impl Session {
    pub fn access_key_id(&self) -> &str {
        &self.credentials.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.credentials.secret_access_key
    }

    pub fn session_token(&self) -> &str {
        &self.credentials.session_token
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.credentials.expiration
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    session: Arc<Session>,
    expires_at: Instant,
}

/// In-memory session cache with a fixed TTL
#[derive(Debug)]
pub struct SessionCache {
    entries: RwLock<HashMap<SessionKey, CacheEntry>>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get a session if present and not expired
    pub async fn get(&self, key: &SessionKey) -> Option<(Arc<Session>, Instant)> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| (entry.session.clone(), entry.expires_at))
    }

    /// Insert a session, dropping any entries that have expired
    pub async fn insert(&self, key: SessionKey, session: Arc<Session>) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            CacheEntry {
                session,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(SESSION_CACHE_TTL_SECS))
    }
}

/// Assumes tenant roles on behalf of one org and caches the sessions
pub struct SessionBroker<S> {
    sts: S,
    org: String,
    cache: SessionCache,
}

impl<S: AssumeRoleOperations> SessionBroker<S> {
    pub fn new(sts: S, org: impl Into<String>) -> Self {
        Self {
            sts,
            org: org.into(),
            cache: SessionCache::default(),
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Return a session for `request`, assuming the role on a cache miss.
    ///
    /// A rejected assumption is `Forbidden` and is not retried. A call cut
    /// short by `ctx` is an `InternalError`, as for any other provider step.
    #[instrument(skip_all, fields(org = %self.org, role_arn = %request.role_arn))]
    pub async fn assume(
        &self,
        ctx: &CallContext,
        request: &RoleRequest,
    ) -> Result<Arc<Session>, ApiError> {
        let key = SessionKey::new(&self.org, request);

        if let Some((session, expires_at)) = self.cache.get(&key).await {
            let remaining = expires_at.saturating_duration_since(Instant::now());
            info!(expires_in_secs = remaining.as_secs(), "Using cached session");
            return Ok(session);
        }

        let input = AssumeRoleInput {
            role_arn: request.role_arn.clone(),
            external_id: request.external_id.clone(),
            session_name: session_name(&self.org),
            duration_secs: SESSION_DURATION_SECS,
            tags: vec![Tag::ownership(&self.org)],
            policy: request.inline_policy.clone(),
            policy_arns: request.managed_policy_arns.clone(),
        };
        debug!(session_name = %input.session_name, "Assuming role");

        let start = Instant::now();
        let result = ctx.run(self.sts.assume_role(input)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let credentials = result.map_err(|e: ProviderError| {
            warn!(elapsed_ms, error = %e, "Failed to assume role");
            if ctx.is_aborted() {
                ApiError::from_provider("failed to assume role", e)
            } else {
                ApiError::from_provider_as(ErrorKind::Forbidden, "failed to assume role", e)
            }
        })?;

        info!(
            elapsed_ms,
            access_key_id = %credentials.access_key_id,
            expiration = %credentials.expiration,
            "Assumed role"
        );

        let session = Arc::new(Session {
            credentials,
            key: key.clone(),
        });
        self.cache.insert(key, session.clone()).await;

        Ok(session)
    }
}

/// Unique STS session name for the org.
///
/// STS allows at most 64 characters from `[\w+=,.@-]`, so the org is
/// sanitized and truncated; the UUID keeps concurrent names distinct.
pub fn session_name(org: &str) -> String {
    const PREFIX: &str = "spinup-";
    const MIDDLE: &str = "-rds-api-";
    let id = uuid::Uuid::new_v4().simple().to_string();

    let budget = MAX_SESSION_NAME_LEN - PREFIX.len() - MIDDLE.len() - id.len();
    let org: String = org
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "+=,.@-_".contains(c) {
                c
            } else {
                '-'
            }
        })
        .take(budget)
        .collect();

    format!("{PREFIX}{org}{MIDDLE}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSts;
    use rds_broker_common::policy::READ_ONLY_MANAGED_POLICY;
    use tokio_util::sync::CancellationToken;

    const ROLE: &str = "arn:aws:iam::123456789012:role/SpinupRds";

    fn broker() -> SessionBroker<FakeSts> {
        SessionBroker::new(FakeSts::default(), "acme")
    }

    fn ctx() -> CallContext {
        CallContext::default()
    }

    #[tokio::test]
    async fn cache_hit_skips_provider() {
        let broker = broker();
        let request = RoleRequest::new(ROLE).with_inline_policy("{}");

        let first = broker.assume(&ctx(), &request).await.unwrap();
        let second = broker.assume(&ctx(), &request).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(broker.sts.calls().len(), 1);
    }

    #[tokio::test]
    async fn inline_policy_isolates_sessions() {
        let broker = broker();
        let a = broker
            .assume(&ctx(), &RoleRequest::new(ROLE).with_inline_policy("policy-a"))
            .await
            .unwrap();
        let b = broker
            .assume(&ctx(), &RoleRequest::new(ROLE).with_inline_policy("policy-b"))
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.access_key_id(), b.access_key_id());
        assert_eq!(broker.sts.calls().len(), 2);
    }

    #[tokio::test]
    async fn external_id_isolates_sessions() {
        let broker = broker();
        broker
            .assume(&ctx(), &RoleRequest::new(ROLE).with_external_id("ext-1"))
            .await
            .unwrap();
        broker
            .assume(&ctx(), &RoleRequest::new(ROLE).with_external_id("ext-2"))
            .await
            .unwrap();
        assert_eq!(broker.sts.calls().len(), 2);
    }

    #[test]
    fn managed_policy_order_does_not_matter() {
        let a = RoleRequest::new(ROLE).with_managed_policy_arns(["arn:b", "arn:a"]);
        let b = RoleRequest::new(ROLE).with_managed_policy_arns(["arn:a", "arn:b"]);
        assert_eq!(SessionKey::new("acme", &a), SessionKey::new("acme", &b));
        assert_ne!(SessionKey::new("acme", &a), SessionKey::new("other", &b));
    }

    #[test]
    fn empty_strings_mean_absent() {
        let request = RoleRequest::new(ROLE)
            .with_external_id("")
            .with_inline_policy("");
        assert_eq!(request, RoleRequest::new(ROLE));
    }

    #[tokio::test(start_paused = true)]
    async fn cached_session_expires_after_ttl() {
        let broker = broker();
        let request = RoleRequest::new(ROLE);

        broker.assume(&ctx(), &request).await.unwrap();
        tokio::time::advance(Duration::from_secs(SESSION_CACHE_TTL_SECS - 1)).await;
        broker.assume(&ctx(), &request).await.unwrap();
        assert_eq!(broker.sts.calls().len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        broker.assume(&ctx(), &request).await.unwrap();
        assert_eq!(broker.sts.calls().len(), 2);
    }

    #[tokio::test]
    async fn assume_input_is_scoped_to_org() {
        let broker = broker();
        let request = RoleRequest::new(ROLE)
            .with_external_id("ext")
            .with_inline_policy("{}")
            .with_managed_policy_arns([READ_ONLY_MANAGED_POLICY]);
        broker.assume(&ctx(), &request).await.unwrap();

        let calls = broker.sts.calls();
        let input = &calls[0];
        assert_eq!(input.role_arn, ROLE);
        assert_eq!(input.duration_secs, 900);
        assert_eq!(input.external_id.as_deref(), Some("ext"));
        assert_eq!(input.policy.as_deref(), Some("{}"));
        assert_eq!(input.policy_arns, vec![READ_ONLY_MANAGED_POLICY.to_string()]);
        assert_eq!(input.tags, vec![Tag::new("spinup:org", "acme")]);
        assert!(input.session_name.starts_with("spinup-acme-rds-api-"));
    }

    #[tokio::test]
    async fn rejected_assumption_is_forbidden_and_not_cached() {
        let broker = broker();
        broker.sts.fail_with(ProviderError::new(
            "AccessDenied",
            "not authorized to perform sts:AssumeRole",
        ));

        let err = broker.assume(&ctx(), &RoleRequest::new(ROLE)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(broker.cache.is_empty().await);

        broker.sts.clear_failure();
        broker.assume(&ctx(), &RoleRequest::new(ROLE)).await.unwrap();
        assert_eq!(broker.sts.calls().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_interrupts_hanging_assumption() {
        let broker = broker();
        broker.sts.hang();
        let token = CancellationToken::new();
        let ctx = CallContext::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let err = broker.assume(&ctx, &RoleRequest::new(ROLE)).await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert!(err.message().ends_with("request cancelled"));
        assert!(broker.cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_hanging_assumption() {
        let broker = broker();
        broker.sts.hang();
        let ctx = CallContext::default().with_timeout(Duration::from_secs(5));

        let err = broker.assume(&ctx, &RoleRequest::new(ROLE)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert!(err.message().ends_with("request deadline exceeded"));
    }

    #[test]
    fn session_names_are_unique_and_bounded() {
        let long_org = "a-very-long-organisation name/with odd chars";
        let a = session_name(long_org);
        let b = session_name(long_org);
        assert_ne!(a, b);
        assert!(a.len() <= MAX_SESSION_NAME_LEN);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || "+=,.@-_".contains(c))
        );
    }
}
