//! Default values shared by the session broker and the orchestrators

/// Lifetime requested for assumed-role credentials (seconds)
pub const SESSION_DURATION_SECS: i32 = 900;

/// How long an assumed session is served from the cache (seconds)
///
/// Shorter than [`SESSION_DURATION_SECS`] so that a cached session always has
/// at least five minutes of validity left when it is handed out.
pub const SESSION_CACHE_TTL_SECS: u64 = 600;

/// Upper bound for a single compensating delete (seconds)
pub const COMPENSATION_TIMEOUT_SECS: u64 = 30;

/// Region used when the configuration does not name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Prefix for snapshots taken automatically on delete
pub const FINAL_SNAPSHOT_PREFIX: &str = "final-";

/// Snapshots whose identifier contains this marker survive a purge
pub const PROTECTED_SNAPSHOT_MARKER: &str = "final-spin";

/// Engine mode that does not need a companion instance after restore
pub const SERVERLESS_ENGINE_MODE: &str = "serverless";

/// Maximum length of an STS role session name
pub const MAX_SESSION_NAME_LEN: usize = 64;

/// Name of the final snapshot for a database being deleted
pub fn final_snapshot_name(id: &str) -> String {
    format!("{FINAL_SNAPSHOT_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_ttl_leaves_buffer_before_expiry() {
        assert!(SESSION_CACHE_TTL_SECS < SESSION_DURATION_SECS as u64);
    }

    #[test]
    fn final_snapshot_naming() {
        assert_eq!(final_snapshot_name("orphan-cluster"), "final-orphan-cluster");
    }
}
