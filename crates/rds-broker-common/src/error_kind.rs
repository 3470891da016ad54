//! Client-facing error categories
//!
//! Every failure that leaves the broker is reduced to one of these kinds.
//! The set is closed: callers can match on it exhaustively.

use serde::Serialize;

/// Closed set of error categories surfaced to callers
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum ErrorKind {
    /// Malformed or contradictory input, or an unmapped provider validation fault
    BadRequest,
    /// Role assumption was rejected
    Forbidden,
    /// Identifier does not refer to an existing resource
    NotFound,
    /// Resource already exists
    Conflict,
    /// Tenant quota exhausted
    LimitExceeded,
    /// Capacity, invalid-state and KMS faults, or a non-provider failure
    InternalError,
}

impl ErrorKind {
    /// HTTP status code an API front end reports for this kind
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::LimitExceeded => 429,
            ErrorKind::InternalError => 500,
        }
    }

    /// Whether the caller could succeed by changing its input
    pub fn is_client_error(self) -> bool {
        self.http_status() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn status_codes() {
        assert_eq!(ErrorKind::BadRequest.http_status(), 400);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::LimitExceeded.http_status(), 429);
        assert_eq!(ErrorKind::InternalError.http_status(), 500);
    }

    #[test]
    fn only_internal_error_is_server_side() {
        for kind in ErrorKind::iter() {
            assert_eq!(
                kind.is_client_error(),
                kind != ErrorKind::InternalError,
                "unexpected classification for {kind}"
            );
        }
    }

    #[test]
    fn display_matches_variant_name() {
        assert_eq!(ErrorKind::LimitExceeded.to_string(), "LimitExceeded");
        assert_eq!(ErrorKind::NotFound.as_ref(), "NotFound");
    }
}
