use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named permissions checked against the host's permission service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    /// `claim`, `release` and `info` commands.
    Claim,
    /// `spawn` and `remove` commands.
    Spawn,
    /// `find` command.
    Find,
    /// Privileged standing: the higher claim limit applies.
    Vip,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Claim,
        Permission::Spawn,
        Permission::Find,
        Permission::Vip,
    ];

    /// The permission name as registered with the host.
    pub fn name(self) -> &'static str {
        match self {
            Permission::Claim => "rideclaim.claim",
            Permission::Spawn => "rideclaim.spawn",
            Permission::Find => "rideclaim.find",
            Permission::Vip => "rideclaim.vip",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown permission '{s}'"))
    }
}

impl TryFrom<String> for Permission {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.name().to_string()
    }
}
