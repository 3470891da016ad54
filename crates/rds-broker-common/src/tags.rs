//! Resource tag constants and ownership normalization
//!
//! Every database, cluster and snapshot the broker creates or tags carries
//! exactly one ownership tag naming the tenant org.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `spinup:org` | Tenant org that owns the resource |
//! | `yale:org` | Legacy alias of `spinup:org`, always replaced |

use serde::{Deserialize, Serialize};

/// Tag key binding a resource (or an assumed session) to the tenant org
pub const TAG_ORG: &str = "spinup:org";

/// Legacy ownership key, treated as the same reserved key as [`TAG_ORG`]
pub const TAG_ORG_LEGACY: &str = "yale:org";

/// A resource tag as accepted in requests and passed to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The ownership tag for `org`
    pub fn ownership(org: &str) -> Self {
        Self::new(TAG_ORG, org)
    }
}

/// Whether `key` is one of the reserved ownership keys
pub fn is_ownership_key(key: &str) -> bool {
    key == TAG_ORG || key == TAG_ORG_LEGACY
}

/// Strip caller-supplied ownership tags and append the tenant's own.
///
/// The relative order of the remaining tags is preserved. Duplicate
/// non-reserved keys are passed through untouched.
pub fn normalize_tags(tags: &[Tag], org: &str) -> Vec<Tag> {
    tags.iter()
        .filter(|t| !is_ownership_key(&t.key))
        .cloned()
        .chain(std::iter::once(Tag::ownership(org)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ownership_count(tags: &[Tag]) -> usize {
        tags.iter().filter(|t| is_ownership_key(&t.key)).count()
    }

    #[test]
    fn appends_ownership_to_empty_set() {
        let tags = normalize_tags(&[], "acme");
        assert_eq!(tags, vec![Tag::new("spinup:org", "acme")]);
    }

    #[test]
    fn replaces_both_aliases() {
        let input = vec![
            Tag::new("yale:org", "other"),
            Tag::new("Name", "db1"),
            Tag::new("spinup:org", "spoofed"),
        ];
        let tags = normalize_tags(&input, "acme");
        assert_eq!(ownership_count(&tags), 1);
        assert_eq!(
            tags,
            vec![Tag::new("Name", "db1"), Tag::new("spinup:org", "acme")]
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = vec![Tag::new("env", "dev"), Tag::new("team", "dba")];
        let once = normalize_tags(&input, "acme");
        let twice = normalize_tags(&once, "acme");
        assert_eq!(once, twice);
        assert_eq!(ownership_count(&twice), 1);
    }

    #[test]
    fn preserves_order_and_duplicates() {
        let input = vec![
            Tag::new("b", "1"),
            Tag::new("a", "2"),
            Tag::new("b", "3"),
        ];
        let tags = normalize_tags(&input, "acme");
        let keys: Vec<_> = tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["b", "a", "b", "spinup:org"]);
    }

    #[test]
    fn deserializes_pascal_case() {
        let tag: Tag = serde_json::from_str(r#"{"Key":"env","Value":"prod"}"#).unwrap();
        assert_eq!(tag, Tag::new("env", "prod"));
    }
}
