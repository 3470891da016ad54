//! rds-broker-common - Shared types and utilities
//!
//! This crate provides the pieces of the broker that have no AWS SDK
//! dependency: the closed error taxonomy, tag normalization, IAM policy
//! generation and the power-state vocabulary.
//!
//! ## Modules
//!
//! - [`defaults`]: Timing constants and naming conventions
//! - [`error_kind`]: Client-facing error categories and their HTTP status
//! - [`policy`]: Inline session policy documents and role ARNs
//! - [`power`]: Start/stop power state
//! - [`tags`]: Ownership tag constants and the tag normalizer

pub mod defaults;
pub mod error_kind;
pub mod policy;
pub mod power;
pub mod tags;

pub use error_kind::ErrorKind;
pub use policy::{Operation, generate_policy, role_arn};
pub use power::{InvalidPowerState, PowerState};
pub use tags::{Tag, normalize_tags};
