//! Authority configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AuthzError, Result as AuthzResult};
use crate::store::Format;
use crate::tree::PermissionTree;
use crate::types::IdNamespace;

/// Environment variable overriding [`AuthorityConfig::data_file`]
pub const ENV_DATA_FILE: &str = "ARBITER_DATA_FILE";
/// Environment variable overriding [`AuthorityConfig::id_namespace`]
pub const ENV_ID_NAMESPACE: &str = "ARBITER_ID_NAMESPACE";
/// Environment variable overriding [`AuthorityConfig::max_id_length`]
pub const ENV_MAX_ID_LENGTH: &str = "ARBITER_MAX_ID_LENGTH";

/// Authority configuration
///
/// ```toml
/// id_namespace = "shared"
/// data_file = "state.json"
/// max_id_length = 64
/// nodes = ["towny.*", "towny.chat.*", "towny.chat.town"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthorityConfig {
    #[serde(default)]
    pub id_namespace: IdNamespace,

    /// Default path for `save_file`/`load_file`
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// Upper bound on the textual length of an entity ID
    #[serde(default)]
    pub max_id_length: Option<usize>,

    /// Permission nodes registered at construction, parents first
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Pretty-print JSON dumps
    #[serde(default = "default_true")]
    pub pretty: bool,
}

fn default_true() -> bool { true }

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            id_namespace: IdNamespace::default(),
            data_file: None,
            max_id_length: None,
            nodes: Vec::new(),
            pretty: default_true(),
        }
    }
}

impl AuthorityConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration file {}", path.as_ref().display()))?;

        let config: AuthorityConfig = toml::from_str(&contents)
            .context("Failed to parse configuration file")?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_settings()
            .context("Invalid authority settings")?;

        PermissionTree::with_nodes(&self.nodes).context("Invalid permission node list")?;

        Ok(())
    }

    /// Checks the ID limit and the data file extension
    ///
    /// The node list is left to registration, which reports its own errors.
    pub fn validate_settings(&self) -> AuthzResult<()> {
        if self.max_id_length == Some(0) {
            return Err(AuthzError::InvalidConfig(
                "max_id_length must be greater than zero".to_string(),
            ));
        }

        if let Some(path) = &self.data_file {
            Format::from_path(path)?;
        }

        Ok(())
    }

    /// Apply `ARBITER_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATA_FILE) {
            self.data_file = Some(PathBuf::from(path));
        }

        if let Some(namespace) = lookup(ENV_ID_NAMESPACE) {
            self.id_namespace = namespace
                .parse::<IdNamespace>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", ENV_ID_NAMESPACE))?;
        }

        if let Some(limit) = lookup(ENV_MAX_ID_LENGTH) {
            let limit: usize = limit
                .parse()
                .with_context(|| format!("Invalid {}", ENV_MAX_ID_LENGTH))?;
            self.max_id_length = Some(limit);
        }

        Ok(())
    }
}
