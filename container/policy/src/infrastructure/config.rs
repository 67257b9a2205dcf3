// Copyright (c) 2026 Capability Container Authors
// SPDX-License-Identifier: AGPL-3.0

//! PDP Configuration Loading
//!
//! Loads the PDP settings document and the two databases it points at, and
//! builds the startup-time [`PolicyTable`] and [`RoleDirectory`].
//!
//! # Settings Format (`pdp.yaml`)
//!
//! ```yaml
//! anonymous_user_id: ANONYMOUS
//! association_timeout: 30s
//! owned_by_predicate: OWNED_BY
//! policy_db: res/config/policydb.yaml
//! user_role_db: res/config/userroledb.yaml
//! ```
//!
//! Relative database paths are resolved against the directory holding the
//! settings file.
//!
//! # Policy Database (`policydb.yaml`)
//!
//! ```yaml
//! - [ANONYMOUS, catalog.list]
//! - [OWNER, ds.get_data, {10: uuid}]
//! - [ADMIN, admin.purge]
//! ```
//!
//! # User Role Database (`userroledb.yaml`)
//!
//! ```yaml
//! roles:
//!   ADMIN: [/DC=org/CN=Alice]
//!   DATA_PROVIDER: [/DC=org/CN=Bob]
//! user-attributes:
//!   /DC=org/CN=Bob: {dispatcher-id: dispatcher.bob}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::association::OWNED_BY;
use crate::domain::policy::{PolicyEntry, PolicyTable};
use crate::domain::role_directory::{RoleDirectory, RoleSource};

pub const CONFIG_PATH_ENV: &str = "CAPCONTAINER_PDP_CONFIG";

/// PDP settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpConfig {
    /// `user-id` value that denotes an unauthenticated requester.
    pub anonymous_user_id: String,

    /// Upper bound on each association query issued by the ownership check.
    #[serde(with = "humantime_serde")]
    pub association_timeout: Duration,

    /// Predicate id passed to the association service for ownership.
    pub owned_by_predicate: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_db: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role_db: Option<PathBuf>,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            anonymous_user_id: "ANONYMOUS".to_string(),
            association_timeout: Duration::from_secs(30),
            owned_by_predicate: OWNED_BY.to_string(),
            policy_db: None,
            user_role_db: None,
        }
    }
}

impl PdpConfig {
    /// Parse settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config = serde_yaml::from_str(yaml).context("Failed to parse PDP configuration")?;
        Ok(config)
    }

    /// Load settings from a YAML file, resolving relative database paths
    /// against the file's directory
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read PDP configuration: {:?}", path))?;
        let mut config = Self::from_yaml_str(&content)?;

        if let Some(base) = path.parent() {
            config.policy_db = config.policy_db.map(|p| resolve_relative(base, p));
            config.user_role_db = config.user_role_db.map(|p| resolve_relative(base, p));
        }
        Ok(config)
    }

    /// Discover a settings file using precedence order
    /// 1. CAPCONTAINER_PDP_CONFIG environment variable
    /// 2. ./pdp.yaml (working directory)
    /// 3. ~/.capcontainer/pdp.yaml (user home)
    /// 4. /etc/capcontainer/pdp.yaml (Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./pdp.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".capcontainer").join("pdp.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/capcontainer/pdp.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load settings with discovery, falling back to defaults
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading PDP configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading PDP configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else {
            tracing::warn!("No PDP configuration file found in standard locations; using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAPCONTAINER_PDP_ASSOCIATION_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!(
                        "Environment override: CAPCONTAINER_PDP_ASSOCIATION_TIMEOUT_SECS={}",
                        secs
                    );
                    self.association_timeout = Duration::from_secs(secs);
                }
                Err(_) => {
                    tracing::warn!(
                        "Ignoring invalid CAPCONTAINER_PDP_ASSOCIATION_TIMEOUT_SECS: '{}'",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("CAPCONTAINER_PDP_ANONYMOUS_USER_ID") {
            tracing::info!("Environment override: CAPCONTAINER_PDP_ANONYMOUS_USER_ID={}", val);
            self.anonymous_user_id = val;
        }

        if let Ok(val) = std::env::var("CAPCONTAINER_PDP_POLICY_DB") {
            self.policy_db = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("CAPCONTAINER_PDP_USER_ROLE_DB") {
            self.user_role_db = Some(PathBuf::from(val));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.anonymous_user_id.is_empty() {
            anyhow::bail!("anonymous_user_id cannot be empty");
        }

        // A zero timeout would fail every ownership check closed
        if self.association_timeout.is_zero() {
            anyhow::bail!("association_timeout must be greater than zero");
        }

        if self.owned_by_predicate.is_empty() {
            anyhow::bail!("owned_by_predicate cannot be empty");
        }

        Ok(())
    }
}

fn resolve_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

/// Startup-time policy state built from the two databases.
#[derive(Debug)]
pub struct PolicyBootstrap {
    pub policy_table: PolicyTable,
    pub role_directory: RoleDirectory,
}

impl PolicyBootstrap {
    /// Build from YAML documents. Any malformed policy entry aborts the build.
    pub fn from_yaml_str(policy_db: &str, user_role_db: &str) -> Result<Self> {
        let entries: Vec<PolicyEntry> =
            serde_yaml::from_str(policy_db).context("Failed to parse policy database")?;
        let policy_table = PolicyTable::build(&entries).map_err(|e| {
            tracing::error!("----- POLICY INIT ERROR ----- {}", e);
            anyhow::Error::new(e).context("Policy database rejected")
        })?;

        let source: RoleSource =
            serde_yaml::from_str(user_role_db).context("Failed to parse user role database")?;
        let role_directory = RoleDirectory::from_source(&source);

        tracing::info!(rules = policy_table.len(), "Policy table initialised");
        Ok(Self {
            policy_table,
            role_directory,
        })
    }

    /// Load both databases named by `config`. A missing path yields an empty
    /// table or directory.
    pub fn load(config: &PdpConfig) -> Result<Self> {
        let policy_db = read_optional(config.policy_db.as_deref(), "[]")?;
        let user_role_db = read_optional(config.user_role_db.as_deref(), "{}")?;
        Self::from_yaml_str(&policy_db, &user_role_db)
    }
}

fn read_optional(path: Option<&Path>, empty: &str) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy database file: {:?}", path)),
        None => {
            tracing::warn!("No database path configured; starting with an empty document");
            Ok(empty.to_string())
        }
    }
}
