//! AWS test utilities
//!
//! Provides region/account detection and unique identifier generation for
//! AWS integration tests.

use chrono::Utc;

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
///
/// # Example
///
/// ```
/// use rds_broker_test_utils::aws::get_test_region;
///
/// let region = get_test_region();
/// assert!(!region.is_empty());
/// ```
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Account number the live tests assume a role into, from `RDS_BROKER_TEST_ACCOUNT`.
pub fn get_test_account() -> Option<String> {
    std::env::var("RDS_BROKER_TEST_ACCOUNT").ok()
}

/// Generate a unique database identifier for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`. RDS identifiers must start with
/// a letter and contain only lowercase letters, digits and hyphens, which
/// this format satisfies.
///
/// # Example
///
/// ```
/// use rds_broker_test_utils::aws::test_identifier;
///
/// let id = test_identifier();
/// assert!(id.starts_with("test-"));
/// ```
pub fn test_identifier() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{}-{}", ts, counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_format() {
        let id = test_identifier();
        let parts: Vec<&str> = id.strip_prefix("test-").unwrap().split('-').collect();
        assert_eq!(parts.len(), 2);
        parts[0].parse::<i64>().expect("Should be valid timestamp");
        parts[1].parse::<u32>().expect("Should be valid counter");
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_identifier_unique() {
        let id1 = test_identifier();
        let id2 = test_identifier();
        assert_ne!(id1, id2);
    }
}
