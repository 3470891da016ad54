//! rds-broker - multi-tenant AWS RDS provisioning orchestrator
//!
//! This crate turns high-level database requests (create, restore, modify,
//! delete, power, snapshot) into sequences of RDS calls made with a
//! per-tenant assumed-role session. Partially created resources are
//! compensated on failure and provider errors are reduced to a small,
//! stable set of error kinds.

pub mod aws;
pub mod config;
pub mod orchestrator;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
