//! Shared test utilities for rds-broker
//!
//! Helpers for the live AWS integration tests, which are `#[ignore]`d by
//! default and only run against a real sandbox account.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique test identifiers

pub mod aws;

pub use aws::{get_test_account, get_test_region, test_identifier};
