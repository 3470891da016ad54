//! AWS error classification and handling
//!
//! Provider failures are captured as [`ProviderError`] using the SDK's
//! `.code()`/`.message()` metadata, never by string matching on Debug output,
//! and are reduced to the closed [`ErrorKind`] set by [`classify`] before they
//! leave the orchestrator.

use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use rds_broker_common::ErrorKind;
use thiserror::Error;

/// A failed call to the provider, reduced to its error code and message.
///
/// `code` is `None` when the failure never reached the service (dispatch,
/// timeout, cancellation) or the response carried no code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.describe())]
pub struct ProviderError {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    /// A service error with an AWS error code
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// A failure that did not come from the service
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Whether the service reported the given error code
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// Whether this error means "no such resource"
    pub fn is_not_found(&self) -> bool {
        classify(self.code.as_deref()) == ErrorKind::NotFound
    }

    fn describe(&self) -> String {
        match &self.code {
            Some(code) => format!("{code}: {}", self.message),
            None => self.message.clone(),
        }
    }
}

impl<E, R> From<SdkError<E, R>> for ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        let code = err.code().map(str::to_string);
        let message = match err.message() {
            Some(m) => m.to_string(),
            None => DisplayErrorContext(&err).to_string(),
        };
        Self { code, message }
    }
}

/// The error type returned by every broker operation
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    provider: Option<ProviderError>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Classify a provider failure, prefixing its message with `context`.
    pub fn from_provider(context: &str, err: ProviderError) -> Self {
        let kind = classify(err.code.as_deref());
        Self {
            kind,
            message: format!("{context}: {}", err.message),
            provider: Some(err),
        }
    }

    /// Same as [`ApiError::from_provider`] but with a fixed kind
    pub fn from_provider_as(kind: ErrorKind, context: &str, err: ProviderError) -> Self {
        Self {
            kind,
            message: format!("{context}: {}", err.message),
            provider: Some(err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying provider failure, if there was one
    pub fn provider(&self) -> Option<&ProviderError> {
        self.provider.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

/// Capacity, invalid-state and KMS faults the caller cannot fix by changing input
const INTERNAL_ERROR_CODES: &[&str] = &[
    "InsufficientDBClusterCapacityFault",
    "InsufficientDBInstanceCapacity",
    "InsufficientStorageClusterCapacity",
    "InvalidDBClusterEndpointStateFault",
    "InvalidDBClusterSnapshotStateFault",
    "InvalidDBClusterStateFault",
    "InvalidDBInstanceAutomatedBackupState",
    "InvalidDBInstanceState",
    "InvalidDBParameterGroupState",
    "InvalidDBProxyStateFault",
    "InvalidDBSecurityGroupState",
    "InvalidDBSnapshotState",
    "InvalidDBSubnetGroupFault",
    "InvalidDBSubnetGroupStateFault",
    "InvalidDBSubnetStateFault",
    "InvalidEventSubscriptionState",
    "InvalidExportOnly",
    "InvalidExportSourceState",
    "InvalidExportTaskStateFault",
    "InvalidGlobalClusterStateFault",
    "InvalidOptionGroupStateFault",
    "InvalidRestoreFault",
    "InvalidS3BucketFault",
    "InvalidVPCNetworkStateFault",
    "KMSKeyNotAccessibleFault",
    "PointInTimeRestoreNotEnabled",
    "ProvisionedIopsNotAvailableInAZFault",
    "StorageTypeNotSupported",
];

/// Name collisions
const CONFLICT_CODES: &[&str] = &[
    "AuthorizationAlreadyExists",
    "CustomAvailabilityZoneAlreadyExists",
    "DBClusterAlreadyExistsFault",
    "DBClusterEndpointAlreadyExistsFault",
    "DBClusterRoleAlreadyExists",
    "DBClusterSnapshotAlreadyExistsFault",
    "DBInstanceAlreadyExists",
    "DBInstanceRoleAlreadyExists",
    "DBParameterGroupAlreadyExists",
    // The proxy fault's wire code differs from its shape name; accept both
    "DBProxyAlreadyExistsFault",
    "DBProxyTargetExistsFault",
    "DBSecurityGroupAlreadyExists",
    "DBSnapshotAlreadyExists",
    "DBSubnetGroupAlreadyExists",
    "ExportTaskAlreadyExists",
    "GlobalClusterAlreadyExistsFault",
    "OptionGroupAlreadyExistsFault",
    "ReservedDBInstanceAlreadyExists",
    "SubnetAlreadyInUse",
    "SubscriptionAlreadyExist",
];

/// Identifiers that do not refer to an existing resource
const NOT_FOUND_CODES: &[&str] = &[
    "DBClusterNotFoundFault",
    "DBClusterSnapshotNotFoundFault",
    "DBInstanceAutomatedBackupNotFound",
    "DBInstanceNotFound",
    "DBSnapshotNotFound",
    "GlobalClusterNotFoundFault",
    "ReservedDBInstanceNotFound",
    "ReservedDBInstancesOfferingNotFound",
    "ResourceNotFoundFault",
];

/// Tenant quota exhaustion
const LIMIT_EXCEEDED_CODES: &[&str] = &[
    "AuthorizationQuotaExceeded",
    "CustomAvailabilityZoneQuotaExceeded",
    "DBClusterEndpointQuotaExceededFault",
    "DBClusterQuotaExceededFault",
    "DBClusterRoleQuotaExceeded",
    "DBInstanceAutomatedBackupQuotaExceeded",
    "DBInstanceRoleQuotaExceeded",
    "DBParameterGroupQuotaExceeded",
    "QuotaExceeded.DBSecurityGroup",
    "DBSubnetGroupQuotaExceeded",
    "DBSubnetQuotaExceededFault",
    "EventSubscriptionQuotaExceeded",
    "GlobalClusterQuotaExceededFault",
    "InstanceQuotaExceeded",
    "OptionGroupQuotaExceededFault",
    "ReservedDBInstanceQuotaExceeded",
    "SharedSnapshotQuotaExceeded",
    "SnapshotQuotaExceeded",
    "StorageQuotaExceeded",
];

/// Classify an AWS error code.
///
/// Unknown codes are treated as validation faults (`BadRequest`); the absence
/// of a code means the failure never came from the service (`InternalError`).
pub fn classify(code: Option<&str>) -> ErrorKind {
    match code {
        None => ErrorKind::InternalError,
        Some(c) if INTERNAL_ERROR_CODES.contains(&c) => ErrorKind::InternalError,
        Some(c) if CONFLICT_CODES.contains(&c) => ErrorKind::Conflict,
        Some(c) if NOT_FOUND_CODES.contains(&c) => ErrorKind::NotFound,
        Some(c) if LIMIT_EXCEEDED_CODES.contains(&c) => ErrorKind::LimitExceeded,
        Some(_) => ErrorKind::BadRequest,
    }
}
