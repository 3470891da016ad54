//! Broker configuration loaded from JSON

use crate::aws::error::ApiError;
use crate::orchestrator::{ProvisioningDefaults, TenantContext};
use directories::ProjectDirs;
use rds_broker_common::defaults::DEFAULT_REGION;
use rds_broker_common::role_arn;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// AWS account number of a tenant account (12 digits)
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Deserialize, derive_more::Display, derive_more::Deref,
)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn is_valid(&self) -> bool {
        self.0.len() == 12 && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("org must not be empty")]
    EmptyOrg,

    #[error("role_name must not be empty")]
    EmptyRoleName,

    #[error("account {name} has invalid account number {number}")]
    InvalidAccount { name: String, number: String },

    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Everything the broker needs to act for one org
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Tenant org; stamped on every created resource
    pub org: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Role assumed in each tenant account
    pub role_name: String,

    #[serde(default)]
    pub external_id: Option<String>,

    /// Account name -> account number
    #[serde(default)]
    pub accounts: HashMap<String, AccountId>,

    #[serde(default)]
    pub defaults: ProvisioningDefaults,
}

impl BrokerConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from a JSON document
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.org.trim().is_empty() {
            return Err(ConfigError::EmptyOrg);
        }
        if self.role_name.trim().is_empty() {
            return Err(ConfigError::EmptyRoleName);
        }
        if let Some((name, number)) = self.accounts.iter().find(|(_, id)| !id.is_valid()) {
            return Err(ConfigError::InvalidAccount {
                name: name.clone(),
                number: number.to_string(),
            });
        }
        Ok(())
    }

    /// `<config dir>/rds-broker/config.json`, when a home directory exists
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rds-broker").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Tenant context handed to every orchestrator call
    pub fn tenant(&self) -> TenantContext {
        TenantContext::new(self.org.clone(), self.defaults.clone())
    }

    pub fn account_number(&self, name: &str) -> Result<&AccountId, ApiError> {
        self.accounts
            .get(name)
            .ok_or_else(|| ApiError::bad_request(format!("unknown account {name}")))
    }

    /// ARN of the broker role in the named account
    pub fn role_arn_for(&self, account: &str) -> Result<String, ApiError> {
        let number = self.account_number(account)?;
        Ok(role_arn(number, &self.role_name))
    }
}
