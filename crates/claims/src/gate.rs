//! Access decisions for damage, storage and mounting.
//!
//! The gate holds no state of its own. Every decision reads the registry and
//! asks the relationship resolver afresh.

use crate::registry::ClaimRegistry;
use crate::relationship::RelationshipResolver;
use crate::reply::Reply;
use crate::{ActorId, ClaimError, ObjectId};
use policy::Decision;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Broad class of incoming damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Passive wear over time.
    Decay,
    #[default]
    Other,
}

/// A protected structure covering the object's location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureZone {
    /// Actors authorized on the structure.
    #[serde(default)]
    pub authorized: HashSet<ActorId>,
}

/// Context of a damage attempt, supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageAttempt {
    pub kind: DamageKind,
    pub in_safe_zone: bool,
    pub structure: Option<StructureZone>,
}

/// What happened when an actor mounted an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// The actor already owns it.
    Greeted,
    Claimed,
    /// The mount went ahead but no claim was made.
    LimitReached { current: usize, threshold: u32 },
    OwnedByOther,
    /// Auto-claim is off, or the actor cannot hold claims.
    Ignored,
}

impl MountOutcome {
    /// What to tell the actor, if anything.
    pub fn reply(&self) -> Option<Reply> {
        match self {
            MountOutcome::Greeted => Some(Reply::WelcomeBack),
            MountOutcome::Claimed => Some(Reply::Claimed),
            MountOutcome::LimitReached { threshold, .. } => Some(Reply::LimitReached {
                threshold: *threshold,
            }),
            MountOutcome::OwnedByOther => Some(Reply::OwnedByOther),
            MountOutcome::Ignored => None,
        }
    }
}

#[derive(Clone)]
pub struct AccessGate {
    registry: ClaimRegistry,
    resolver: RelationshipResolver,
}

impl AccessGate {
    pub fn new(registry: ClaimRegistry, resolver: RelationshipResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn resolver(&self) -> &RelationshipResolver {
        &self.resolver
    }

    /// May the object take this damage?
    ///
    /// Safe zones block everything. The remaining rules only protect claimed
    /// objects.
    pub fn damage_check(&self, object: ObjectId, attempt: &DamageAttempt) -> Decision {
        if attempt.in_safe_zone {
            return Decision::deny("object is in a safe zone");
        }

        let Some(owner) = self.registry.lookup(object) else {
            return Decision::Allow;
        };
        let rules = &self.registry.policy().damage;

        if attempt.kind == DamageKind::Decay && !rules.allow_decay {
            debug!(%object, "blocking decay damage");
            return Decision::deny("decay is disabled for claimed objects");
        }

        debug!(%object, %owner, "claimed object is being damaged");
        if !rules.allow_damage {
            return Decision::deny("damage is disabled for claimed objects");
        }

        if rules.structure_protection {
            if let Some(zone) = &attempt.structure {
                if !rules.structure_requires_authorization {
                    debug!(%object, %owner, "protected by structure");
                    return Decision::deny("object is inside a protected structure");
                }
                if zone.authorized.contains(&owner) {
                    debug!(%object, %owner, "protected by structure the owner is authorized on");
                    return Decision::deny("owner is authorized on the covering structure");
                }
                debug!(%object, %owner, "owner not authorized on structure, damage allowed");
            }
        }

        Decision::Allow
    }

    /// May the actor open the object's storage?
    pub fn loot_check(&self, object: ObjectId, actor: ActorId) -> Decision {
        if !self.registry.policy().access.restrict_storage {
            return Decision::Allow;
        }
        self.related_or_unclaimed(object, actor, "storage")
    }

    /// May the actor mount the object?
    pub fn mount_check(&self, object: ObjectId, actor: ActorId) -> Decision {
        if !self.registry.policy().access.restrict_mounting {
            return Decision::Allow;
        }
        self.related_or_unclaimed(object, actor, "mounting")
    }

    /// The actor has mounted the object: greet an owner or claim a free one.
    pub fn on_mounted(&self, object: ObjectId, actor: ActorId) -> MountOutcome {
        if !self.registry.policy().access.claim_on_first_mount || actor.is_server() {
            return MountOutcome::Ignored;
        }

        match self.registry.claim(object, actor) {
            Ok(()) => {
                debug!(%object, %actor, "claimed on first mount");
                MountOutcome::Claimed
            }
            Err(ClaimError::AlreadyClaimed { .. }) => MountOutcome::Greeted,
            Err(ClaimError::OwnedByOther { .. }) => MountOutcome::OwnedByOther,
            Err(ClaimError::LimitReached { current, threshold }) => {
                MountOutcome::LimitReached { current, threshold }
            }
            Err(e) => {
                warn!(%object, %actor, "mount claim failed: {e}");
                MountOutcome::Ignored
            }
        }
    }

    fn related_or_unclaimed(&self, object: ObjectId, actor: ActorId, action: &str) -> Decision {
        let Some(owner) = self.registry.lookup(object) else {
            return Decision::Allow;
        };
        if self.resolver.are_related(actor, owner) {
            debug!(%object, %actor, %owner, "{action} allowed");
            return Decision::Allow;
        }
        debug!(%object, %actor, %owner, "{action} blocked");
        Decision::deny(format!("{action} is reserved for the owner and their allies"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ObjectHost;
    use crate::relationship::FriendsProvider;
    use crate::schedule::ManualScheduler;
    use crate::testing::FakeHost;
    use policy::{ClaimPolicy, RelationshipSources};
    use std::sync::Arc;
    use storage::ResourceStore;

    const OWNER: ActorId = ActorId(100);
    const FRIEND: ActorId = ActorId(200);
    const STRANGER: ActorId = ActorId(300);

    struct Friends;

    impl FriendsProvider for Friends {
        fn are_friends(&self, a: ActorId, b: ActorId) -> bool {
            (a, b) == (FRIEND, OWNER)
        }
    }

    fn setup(policy: ClaimPolicy) -> (Arc<FakeHost>, AccessGate) {
        let host = Arc::new(FakeHost::with_objects(1..=5));
        let resolver =
            RelationshipResolver::new(policy.relationships).with_friends(Arc::new(Friends));
        let registry = ClaimRegistry::builder(
            policy,
            ResourceStore::in_memory().unwrap(),
            host.clone(),
            Arc::new(ManualScheduler::new()),
        )
        .build()
        .unwrap();
        registry.claim(ObjectId(1), OWNER).unwrap();
        (host, AccessGate::new(registry, resolver))
    }

    fn restricted() -> ClaimPolicy {
        let mut policy = ClaimPolicy::default();
        policy.access.restrict_mounting = true;
        policy.access.restrict_storage = true;
        policy.relationships = RelationshipSources {
            friends: true,
            ..Default::default()
        };
        policy
    }

    fn structure(authorized: &[ActorId]) -> Option<StructureZone> {
        Some(StructureZone {
            authorized: authorized.iter().copied().collect(),
        })
    }

    #[test]
    fn test_safe_zone_always_blocks() {
        let mut policy = ClaimPolicy::default();
        policy.damage.allow_decay = true;
        policy.damage.allow_damage = true;
        policy.damage.structure_protection = false;
        let (_, gate) = setup(policy);

        let attempt = DamageAttempt {
            in_safe_zone: true,
            ..Default::default()
        };
        assert!(!gate.damage_check(ObjectId(1), &attempt).is_allowed());
        // unclaimed objects too
        assert!(!gate.damage_check(ObjectId(2), &attempt).is_allowed());
    }

    #[test]
    fn test_unclaimed_takes_any_damage() {
        let mut policy = ClaimPolicy::default();
        policy.damage.allow_damage = false;
        let (_, gate) = setup(policy);

        let decay = DamageAttempt {
            kind: DamageKind::Decay,
            ..Default::default()
        };
        assert_eq!(gate.damage_check(ObjectId(2), &decay), Decision::Allow);
        assert_eq!(
            gate.damage_check(ObjectId(2), &DamageAttempt::default()),
            Decision::Allow
        );
    }

    #[test]
    fn test_decay_blocked_unless_allowed() {
        let decay = DamageAttempt {
            kind: DamageKind::Decay,
            ..Default::default()
        };

        let (_, gate_default) = setup(ClaimPolicy::default());
        assert!(!gate_default.damage_check(ObjectId(1), &decay).is_allowed());

        let mut policy = ClaimPolicy::default();
        policy.damage.allow_decay = true;
        let (_, allowing) = setup(policy.clone());
        assert!(allowing.damage_check(ObjectId(1), &decay).is_allowed());

        // allowed decay still goes through the remaining checks
        policy.damage.allow_damage = false;
        let (_, strict) = setup(policy);
        assert!(!strict.damage_check(ObjectId(1), &decay).is_allowed());
    }

    #[test]
    fn test_damage_disabled_blocks_claimed() {
        let mut policy = ClaimPolicy::default();
        policy.damage.allow_damage = false;
        let (_, gate) = setup(policy);
        assert!(
            !gate
                .damage_check(ObjectId(1), &DamageAttempt::default())
                .is_allowed()
        );
    }

    #[test]
    fn test_structure_requires_owner_authorization() {
        let (_, gate) = setup(ClaimPolicy::default());

        let authorized = DamageAttempt {
            structure: structure(&[OWNER]),
            ..Default::default()
        };
        assert!(!gate.damage_check(ObjectId(1), &authorized).is_allowed());

        let unauthorized = DamageAttempt {
            structure: structure(&[STRANGER]),
            ..Default::default()
        };
        assert!(gate.damage_check(ObjectId(1), &unauthorized).is_allowed());

        assert!(
            gate.damage_check(ObjectId(1), &DamageAttempt::default())
                .is_allowed()
        );
    }

    #[test]
    fn test_structure_without_authorization_matching() {
        let mut policy = ClaimPolicy::default();
        policy.damage.structure_requires_authorization = false;
        let (_, gate) = setup(policy);

        let attempt = DamageAttempt {
            structure: structure(&[]),
            ..Default::default()
        };
        assert!(!gate.damage_check(ObjectId(1), &attempt).is_allowed());
    }

    #[test]
    fn test_structure_protection_off() {
        let mut policy = ClaimPolicy::default();
        policy.damage.structure_protection = false;
        let (_, gate) = setup(policy);

        let attempt = DamageAttempt {
            structure: structure(&[OWNER]),
            ..Default::default()
        };
        assert!(gate.damage_check(ObjectId(1), &attempt).is_allowed());
    }

    #[test]
    fn test_mount_and_loot_unrestricted_by_default() {
        let (_, gate) = setup(ClaimPolicy::default());
        assert!(gate.mount_check(ObjectId(1), STRANGER).is_allowed());
        assert!(gate.loot_check(ObjectId(1), STRANGER).is_allowed());
    }

    #[test]
    fn test_restricted_mount_and_loot() {
        let (_, gate) = setup(restricted());

        for check in [AccessGate::mount_check, AccessGate::loot_check] {
            assert!(check(&gate, ObjectId(1), OWNER).is_allowed());
            assert!(check(&gate, ObjectId(1), FRIEND).is_allowed());
            assert!(!check(&gate, ObjectId(1), STRANGER).is_allowed());
            // unclaimed
            assert!(check(&gate, ObjectId(2), STRANGER).is_allowed());
        }
    }

    #[test]
    fn test_first_mount_claims() {
        let (host, gate) = setup(ClaimPolicy::default());

        assert_eq!(gate.on_mounted(ObjectId(2), STRANGER), MountOutcome::Claimed);
        assert_eq!(host.owner_of(ObjectId(2)), Some(STRANGER));
        assert_eq!(gate.on_mounted(ObjectId(2), STRANGER), MountOutcome::Greeted);
        assert_eq!(gate.on_mounted(ObjectId(1), STRANGER), MountOutcome::OwnedByOther);
    }

    #[test]
    fn test_mount_at_limit_does_not_claim() {
        let (host, gate) = setup(ClaimPolicy::default());
        gate.on_mounted(ObjectId(2), OWNER);

        let outcome = gate.on_mounted(ObjectId(3), OWNER);
        assert_eq!(
            outcome,
            MountOutcome::LimitReached {
                current: 2,
                threshold: 2
            }
        );
        assert_eq!(outcome.reply(), Some(Reply::LimitReached { threshold: 2 }));
        assert_eq!(host.owner_of(ObjectId(3)), Some(ActorId::SERVER));
    }

    #[test]
    fn test_mount_claim_disabled() {
        let mut policy = ClaimPolicy::default();
        policy.access.claim_on_first_mount = false;
        let (_, gate) = setup(policy);

        assert_eq!(gate.on_mounted(ObjectId(2), STRANGER), MountOutcome::Ignored);
        assert_eq!(gate.on_mounted(ObjectId(2), ActorId::SERVER), MountOutcome::Ignored);
    }
}
