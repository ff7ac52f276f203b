//! Policy configuration and enforcement.

use crate::{Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration schema version written by this release.
pub const CURRENT_VERSION: Version = Version::new(1, 0, 18);

/// Claim policy loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPolicy {
    /// Schema version the file was last written with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    /// Per-owner claim limits.
    #[serde(default)]
    pub limits: LimitRules,

    /// Timed auto-release of claims.
    #[serde(default)]
    pub lease: LeaseRules,

    /// Damage protection for claimed objects.
    #[serde(default)]
    pub damage: DamageRules,

    /// Storage and mounting restrictions.
    #[serde(default)]
    pub access: AccessRules,

    /// Which relationship sources count as "friendly".
    #[serde(default)]
    pub relationships: RelationshipSources,
}

/// Per-owner claim limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRules {
    /// Enforce limits at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Limit for ordinary actors.
    #[serde(default = "default_limit")]
    pub default: u32,

    /// Limit for actors holding the VIP permission.
    #[serde(default = "default_privileged_limit")]
    pub privileged: u32,
}

/// Timed auto-release of claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRules {
    /// Arm a release timer for every claim.
    #[serde(default)]
    pub enabled: bool,

    /// Countdown length in seconds.
    #[serde(default = "default_release_after_secs")]
    pub release_after_secs: u64,

    /// Release even while the owner is riding the object.
    #[serde(default)]
    pub release_while_occupied: bool,
}

/// Damage protection for claimed objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRules {
    /// Let decay through to the remaining checks.
    #[serde(default)]
    pub allow_decay: bool,

    /// Allow damage to claimed objects at all.
    #[serde(default = "default_true")]
    pub allow_damage: bool,

    /// Block damage inside a protected structure's privilege zone.
    #[serde(default = "default_true")]
    pub structure_protection: bool,

    /// Only protect when the owner is authorized on that structure.
    #[serde(default = "default_true")]
    pub structure_requires_authorization: bool,
}

/// Storage and mounting restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRules {
    /// Only the owner and related actors may mount a claimed object.
    #[serde(default)]
    pub restrict_mounting: bool,

    /// Only the owner and related actors may loot a claimed object.
    #[serde(default)]
    pub restrict_storage: bool,

    /// Claim an unowned object for whoever mounts it first.
    #[serde(default = "default_true")]
    pub claim_on_first_mount: bool,

    /// Restore full health when an object is claimed.
    #[serde(default = "default_true")]
    pub restore_health_on_claim: bool,
}

/// Relationship sources consulted for shared access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSources {
    #[serde(default)]
    pub friends: bool,

    #[serde(default)]
    pub clans: bool,

    #[serde(default)]
    pub teams: bool,
}

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Decision::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

fn default_true() -> bool {
    true
}

fn default_limit() -> u32 {
    2
}

fn default_privileged_limit() -> u32 {
    5
}

fn default_release_after_secs() -> u64 {
    600
}

impl Default for LimitRules {
    fn default() -> Self {
        Self {
            enabled: true,
            default: default_limit(),
            privileged: default_privileged_limit(),
        }
    }
}

impl LimitRules {
    /// The threshold that applies to an actor.
    pub fn threshold(&self, privileged: bool) -> u32 {
        if privileged {
            self.privileged
        } else {
            self.default
        }
    }

    /// Whether an actor holding `count` claims may not claim another.
    ///
    /// An actor with no claims is never at the limit, so a threshold of zero
    /// still permits a first claim.
    pub fn is_at_limit(&self, count: usize, privileged: bool) -> bool {
        if !self.enabled || count == 0 {
            return false;
        }
        count >= self.threshold(privileged) as usize
    }
}

impl Default for LeaseRules {
    fn default() -> Self {
        Self {
            enabled: false,
            release_after_secs: default_release_after_secs(),
            release_while_occupied: false,
        }
    }
}

impl LeaseRules {
    pub fn release_after(&self) -> Duration {
        Duration::from_secs(self.release_after_secs)
    }
}

impl Default for DamageRules {
    fn default() -> Self {
        Self {
            allow_decay: false,
            allow_damage: true,
            structure_protection: true,
            structure_requires_authorization: true,
        }
    }
}

impl Default for AccessRules {
    fn default() -> Self {
        Self {
            restrict_mounting: false,
            restrict_storage: false,
            claim_on_first_mount: true,
            restore_health_on_claim: true,
        }
    }
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            version: Some(CURRENT_VERSION),
            limits: LimitRules::default(),
            lease: LeaseRules::default(),
            damage: DamageRules::default(),
            access: AccessRules::default(),
            relationships: RelationshipSources::default(),
        }
    }
}

impl ClaimPolicy {
    /// Load policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse policy from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let policy: Self = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Render the policy as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialize(e.to_string()))
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.lease.enabled && self.lease.release_after_secs == 0 {
            return Err(Error::Invalid(
                "lease.release_after_secs must be positive when leases are enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply one-time upgrades for files written by older releases.
    ///
    /// A file without a version is taken to be current. Returns `true` when
    /// the policy changed and should be written back.
    pub fn migrate(&mut self) -> bool {
        let Some(version) = self.version.clone() else {
            self.version = Some(CURRENT_VERSION);
            return true;
        };

        if version < Version::new(1, 0, 17) {
            self.damage = DamageRules::default();
        }
        if version < Version::new(1, 0, 18) {
            self.access.restore_health_on_claim = true;
        }

        if version == CURRENT_VERSION {
            return false;
        }
        self.version = Some(CURRENT_VERSION);
        true
    }
}
