//! Configuration loading from rideclaim.toml.

use crate::error::{Error, Result};
use claims::ActorId;
use policy::{ClaimPolicy, Permission};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path of the claim database. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[serde(default)]
    pub debug: bool,

    /// Claim rules.
    #[serde(flatten)]
    pub policy: ClaimPolicy,

    /// Permissions granted to actors, keyed by actor id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub grants: BTreeMap<String, Vec<Permission>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml).map_err(|e| Error::Config(e.to_string()))?;
        config.policy.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, else the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Apply version migrations, writing the file back if anything changed.
    ///
    /// Nothing is written for a file that does not exist yet.
    pub fn upgrade(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !self.policy.migrate() || !path.exists() {
            return Ok(false);
        }
        info!(path = %path.display(), "upgrading configuration");
        self.save(path)?;
        Ok(true)
    }

    /// Write the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The `[grants]` table keyed by parsed actor ids.
    pub fn grant_table(&self) -> Result<HashMap<ActorId, HashSet<Permission>>> {
        self.grants
            .iter()
            .map(|(actor, permissions)| {
                let actor = actor
                    .parse::<u64>()
                    .map_err(|_| Error::Config(format!("invalid actor id in grants: {actor}")))?;
                Ok((ActorId(actor), permissions.iter().copied().collect()))
            })
            .collect()
    }
}
