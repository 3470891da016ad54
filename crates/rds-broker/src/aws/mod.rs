//! AWS client modules for the broker
//!
//! This module provides wrappers around AWS SDK clients for:
//! - RDS: Cluster, instance and snapshot management
//! - STS: Cross-account role assumption
//! - session: Cached, policy-scoped tenant sessions

pub mod context;
pub mod error;
pub mod rds;
pub mod session;
pub mod sts;

// Core clients
pub use context::AwsContext;
pub use rds::{RdsClient, RdsOperations};
pub use session::{RoleRequest, Session, SessionBroker, SessionCache};
pub use sts::{AssumeRoleInput, AssumeRoleOperations, StsClient, TemporaryCredentials};

// Error handling
pub use error::{ApiError, ProviderError, classify};
