//! Least-privilege session policies
//!
//! Each broker operation assumes the tenant role with an inline policy that
//! only allows the RDS actions that operation needs, plus the AWS-managed
//! read-only policy as the outer boundary.

use serde_json::json;

/// AWS-managed policy attached to every assumed session
pub const READ_ONLY_MANAGED_POLICY: &str = "arn:aws:iam::aws:policy/AmazonRDSReadOnlyAccess";

/// IAM policy language version
const POLICY_VERSION: &str = "2012-10-17";

/// Broker operations that need their own scoped session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Operation {
    DatabaseCreate,
    DatabaseRestore,
    DatabaseModify,
    DatabaseDelete,
    DatabasePower,
    DatabaseRead,
    SnapshotCreate,
    SnapshotRead,
    SnapshotDelete,
    SnapshotModify,
    SnapshotVersions,
}

impl Operation {
    /// RDS actions the inline session policy allows for this operation
    pub fn policy_actions(self) -> &'static [&'static str] {
        match self {
            Operation::DatabaseCreate => &[
                "rds:CreateDBCluster",
                "rds:CreateDBInstance",
                "rds:DeleteDBCluster",
                "rds:AddTagsToResource",
                "rds:DescribeDBEngineVersions",
            ],
            Operation::DatabaseRestore => &[
                "rds:RestoreDBClusterFromSnapshot",
                "rds:RestoreDBInstanceFromDBSnapshot",
                "rds:CreateDBInstance",
                "rds:DeleteDBCluster",
                "rds:AddTagsToResource",
                "rds:DescribeDBClusterSnapshots",
                "rds:DescribeDBSnapshots",
                "rds:DescribeDBEngineVersions",
            ],
            Operation::DatabaseModify => &[
                "rds:ModifyDBCluster",
                "rds:ModifyDBInstance",
                "rds:AddTagsToResource",
                "rds:DescribeDBClusters",
                "rds:DescribeDBInstances",
                "rds:DescribeDBEngineVersions",
            ],
            Operation::DatabaseDelete => &[
                "rds:DeleteDBCluster",
                "rds:DeleteDBInstance",
                "rds:CreateDBClusterSnapshot",
                "rds:CreateDBSnapshot",
                "rds:DescribeDBInstances",
            ],
            Operation::DatabasePower => &[
                "rds:StartDBCluster",
                "rds:StopDBCluster",
                "rds:StartDBInstance",
                "rds:StopDBInstance",
            ],
            Operation::DatabaseRead => &["rds:DescribeDBClusters", "rds:DescribeDBInstances"],
            Operation::SnapshotCreate => &[
                "rds:CreateDBSnapshot",
                "rds:CreateDBClusterSnapshot",
                "rds:AddTagsToResource",
            ],
            Operation::SnapshotRead => &["rds:DescribeDBClusterSnapshots", "rds:DescribeDBSnapshots"],
            Operation::SnapshotDelete => &["rds:DeleteDBClusterSnapshot", "rds:DeleteDBSnapshot"],
            Operation::SnapshotModify => &["rds:ModifyDBSnapshot"],
            Operation::SnapshotVersions => &["rds:DescribeDBEngineVersions"],
        }
    }

    /// Inline policy document for this operation
    pub fn policy(self) -> String {
        generate_policy(self.policy_actions())
    }
}

/// Build an inline policy document allowing `actions` on every resource.
pub fn generate_policy(actions: &[&str]) -> String {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Effect": "Allow",
                "Action": actions,
                "Resource": ["*"]
            }
        ]
    })
    .to_string()
}

/// ARN of the cross-account role the broker assumes in `account`
pub fn role_arn(account: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account}:role/{role_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn policy_document_shape() {
        let doc: serde_json::Value =
            serde_json::from_str(&generate_policy(&["rds:ModifyDBSnapshot"])).unwrap();
        assert_eq!(doc["Version"], "2012-10-17");
        let stmt = &doc["Statement"][0];
        assert_eq!(stmt["Effect"], "Allow");
        assert_eq!(stmt["Action"], json!(["rds:ModifyDBSnapshot"]));
        assert_eq!(stmt["Resource"], json!(["*"]));
    }

    #[test]
    fn every_operation_allows_only_rds_actions() {
        for op in Operation::iter() {
            let actions = op.policy_actions();
            assert!(!actions.is_empty(), "{op} has no actions");
            assert!(actions.iter().all(|a| a.starts_with("rds:")), "{op}");
        }
    }

    #[test]
    fn tagging_operations_allow_add_tags() {
        for op in [
            Operation::DatabaseCreate,
            Operation::DatabaseRestore,
            Operation::DatabaseModify,
            Operation::SnapshotCreate,
        ] {
            assert!(
                op.policy_actions().contains(&"rds:AddTagsToResource"),
                "{op} tags resources but cannot add tags"
            );
        }

        let doc: serde_json::Value =
            serde_json::from_str(&Operation::SnapshotCreate.policy()).unwrap();
        let actions = doc["Statement"][0]["Action"].as_array().unwrap();
        assert!(actions.contains(&json!("rds:AddTagsToResource")));
    }

    #[test]
    fn distinct_operations_get_distinct_policies() {
        assert_ne!(
            Operation::SnapshotCreate.policy(),
            Operation::SnapshotDelete.policy()
        );
    }

    #[test]
    fn role_arn_format() {
        assert_eq!(
            role_arn("123456789012", "SpinupRdsRole"),
            "arn:aws:iam::123456789012:role/SpinupRdsRole"
        );
    }
}
