//! Claim policy: configuration, claim limits and permission names.
//!
//! Core principle: **policy is read once and never mutated while claims are
//! being decided**. The only writes happen in [`ClaimPolicy::migrate`], which
//! runs at load time.

mod error;
mod permission;
mod policy;

pub use error::{Error, Result};
pub use permission::Permission;
pub use policy::{
    AccessRules, ClaimPolicy, CURRENT_VERSION, DamageRules, Decision, LeaseRules, LimitRules,
    RelationshipSources,
};
