//! Tenant context passed explicitly to every orchestrator call

use rds_broker_common::{Tag, normalize_tags};
use serde::Deserialize;
use std::collections::HashMap;

/// Per-tenant provisioning defaults applied when a request leaves them unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProvisioningDefaults {
    /// Subnet group used when a request names none
    pub subnet_group: Option<String>,
    /// Parameter-group family -> instance parameter group name
    pub db_parameter_groups: HashMap<String, String>,
    /// Parameter-group family -> cluster parameter group name
    pub cluster_parameter_groups: HashMap<String, String>,
}

/// The organisation a request acts for, and its defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub org: String,
    pub defaults: ProvisioningDefaults,
}

impl TenantContext {
    pub fn new(org: impl Into<String>, defaults: ProvisioningDefaults) -> Self {
        Self {
            org: org.into(),
            defaults,
        }
    }

    /// Caller tags with exactly one ownership tag for this tenant
    pub fn normalize_tags(&self, tags: &[Tag]) -> Vec<Tag> {
        normalize_tags(tags, &self.org)
    }

    /// The requested subnet group, or the tenant default
    pub fn subnet_group_or_default(&self, requested: Option<&str>) -> Option<String> {
        requested
            .map(str::to_string)
            .or_else(|| self.defaults.subnet_group.clone())
    }
}
