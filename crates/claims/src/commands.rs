//! Player commands.
//!
//! Each command is gated by a named permission. An actor without it gets
//! [`Reply::NotAuthorized`] and nothing changes.

use crate::grid::grid_label;
use crate::host::CommandHost;
use crate::registry::ClaimRegistry;
use crate::reply::Reply;
use crate::{ActorId, ClaimError, ObjectId};
use policy::Permission;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    Claim { object: ObjectId },
    Release { object: ObjectId },
    Spawn,
    Remove { object: ObjectId },
    Find,
    Info { object: ObjectId },
}

impl Command {
    /// Permission required to run the command.
    pub fn permission(&self) -> Permission {
        match self {
            Command::Claim { .. } | Command::Release { .. } | Command::Info { .. } => {
                Permission::Claim
            }
            Command::Spawn | Command::Remove { .. } => Permission::Spawn,
            Command::Find => Permission::Find,
        }
    }
}

#[derive(Clone)]
pub struct CommandSurface {
    registry: ClaimRegistry,
    world: Arc<dyn CommandHost>,
}

impl CommandSurface {
    pub fn new(registry: ClaimRegistry, world: Arc<dyn CommandHost>) -> Self {
        Self { registry, world }
    }

    pub fn execute(&self, actor: ActorId, command: Command) -> Reply {
        if !self.permitted(actor, command.permission()) {
            debug!(%actor, ?command, "command not authorized");
            return Reply::NotAuthorized;
        }

        match command {
            Command::Claim { object } => self.claim(object, actor),
            Command::Release { object } => self.release(object, actor),
            Command::Spawn => self.spawn(actor),
            Command::Remove { object } => self.remove(object, actor),
            Command::Find => self.find(actor),
            Command::Info { object } => self.info(object),
        }
    }

    fn permitted(&self, actor: ActorId, permission: Permission) -> bool {
        match self.registry.has_permission(actor, permission) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(%actor, %permission, "permission check unavailable: {e}");
                false
            }
        }
    }

    fn claim(&self, object: ObjectId, actor: ActorId) -> Reply {
        if !self.world.exists(object) {
            return Reply::NoObjects;
        }
        match self.registry.claim(object, actor) {
            Ok(()) => Reply::Claimed,
            Err(e) => claim_failure(e),
        }
    }

    fn release(&self, object: ObjectId, actor: ActorId) -> Reply {
        if !self.world.exists(object) {
            return Reply::NoObjects;
        }
        match self.registry.release(object, actor) {
            Ok(()) => Reply::Released,
            Err(ClaimError::NotOwner { .. }) => Reply::NotYours,
            Err(e) => Reply::Failed(e.to_string()),
        }
    }

    fn spawn(&self, actor: ActorId) -> Reply {
        if self.registry.is_at_limit(actor) {
            return Reply::LimitReached {
                threshold: self.registry.threshold_for(actor),
            };
        }

        let Some(object) = self.world.spawn_near(actor) else {
            return Reply::SpawnFailed;
        };
        info!(%object, %actor, "spawned");

        let claimed = self.permitted(actor, Permission::Claim)
            && match self.registry.claim(object, actor) {
                Ok(()) => true,
                Err(e) => {
                    warn!(%object, %actor, "could not claim spawned object: {e}");
                    false
                }
            };
        Reply::Spawned { claimed }
    }

    fn remove(&self, object: ObjectId, actor: ActorId) -> Reply {
        if !self.world.exists(object) {
            return Reply::NoObjects;
        }
        if self.registry.lookup(object) != Some(actor) {
            return Reply::NotYours;
        }

        self.world.destroy(object);
        self.registry.on_destroyed(object);
        info!(%object, %actor, "removed");
        Reply::Removed
    }

    fn find(&self, actor: ActorId) -> Reply {
        let located = self.registry.find_by_owner(actor).and_then(|object| {
            let at = self.world.object_position(object)?;
            let from = self.world.actor_position(actor)?;
            Some((at, from))
        });
        let Some((at, from)) = located else {
            return Reply::NoObjects;
        };

        Reply::Found {
            distance: at.distance(&from).round() as u32,
            grid: grid_label(self.world.as_ref(), at),
        }
    }

    fn info(&self, object: ObjectId) -> Reply {
        let Some(health) = self.world.health(object) else {
            return Reply::NoObjects;
        };
        let owner = self.registry.lookup(object).map(|owner| {
            self.world
                .display_name(owner)
                .unwrap_or_else(|| owner.to_string())
        });
        let lease_remaining = self.registry.lease(object).map(|lease| lease.remaining());

        Reply::Info {
            health,
            owner,
            lease_remaining,
        }
    }
}

fn claim_failure(e: ClaimError) -> Reply {
    match e {
        ClaimError::AlreadyClaimed { .. } => Reply::AlreadyYours,
        ClaimError::OwnedByOther { .. } => Reply::OwnedByOther,
        ClaimError::LimitReached { threshold, .. } => Reply::LimitReached { threshold },
        ClaimError::NotFound(_) => Reply::NoObjects,
        ClaimError::InvalidActor(_) => Reply::NotAuthorized,
        e => Reply::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ObjectHost, Position};
    use crate::schedule::ManualScheduler;
    use crate::testing::{FakeHost, Grants};
    use policy::ClaimPolicy;
    use std::time::Duration;
    use storage::ResourceStore;

    const A: ActorId = ActorId(100);
    const B: ActorId = ActorId(200);

    struct Fixture {
        host: Arc<FakeHost>,
        grants: Arc<Grants>,
        registry: ClaimRegistry,
        commands: CommandSurface,
    }

    fn fixture(policy: ClaimPolicy) -> Fixture {
        let host = Arc::new(FakeHost::with_objects(1..=5));
        let grants = Arc::new(Grants::default());
        grants.grant_all(A);
        grants.grant(B, Permission::Claim);
        let registry = ClaimRegistry::builder(
            policy,
            ResourceStore::in_memory().unwrap(),
            host.clone(),
            Arc::new(ManualScheduler::new()),
        )
        .permissions(grants.clone())
        .build()
        .unwrap();
        let commands = CommandSurface::new(registry.clone(), host.clone());
        Fixture {
            host,
            grants,
            registry,
            commands,
        }
    }

    #[test]
    fn test_permissions_per_command() {
        assert_eq!(Command::Claim { object: ObjectId(1) }.permission(), Permission::Claim);
        assert_eq!(Command::Release { object: ObjectId(1) }.permission(), Permission::Claim);
        assert_eq!(Command::Info { object: ObjectId(1) }.permission(), Permission::Claim);
        assert_eq!(Command::Spawn.permission(), Permission::Spawn);
        assert_eq!(Command::Remove { object: ObjectId(1) }.permission(), Permission::Spawn);
        assert_eq!(Command::Find.permission(), Permission::Find);
    }

    #[test]
    fn test_unauthorized_changes_nothing() {
        let f = fixture(ClaimPolicy::default());
        let outsider = ActorId(999);

        let reply = f.commands.execute(outsider, Command::Claim { object: ObjectId(1) });
        assert_eq!(reply, Reply::NotAuthorized);
        assert!(f.registry.is_empty());

        assert_eq!(f.commands.execute(B, Command::Spawn), Reply::NotAuthorized);
        assert_eq!(f.commands.execute(B, Command::Find), Reply::NotAuthorized);
    }

    #[test]
    fn test_claim_and_release() {
        let f = fixture(ClaimPolicy::default());

        assert_eq!(f.commands.execute(A, Command::Claim { object: ObjectId(1) }), Reply::Claimed);
        assert_eq!(
            f.commands.execute(A, Command::Claim { object: ObjectId(1) }),
            Reply::AlreadyYours
        );
        assert_eq!(
            f.commands.execute(B, Command::Claim { object: ObjectId(1) }),
            Reply::OwnedByOther
        );
        assert_eq!(
            f.commands.execute(B, Command::Release { object: ObjectId(1) }),
            Reply::NotYours
        );
        assert_eq!(
            f.commands.execute(A, Command::Release { object: ObjectId(1) }),
            Reply::Released
        );
        assert_eq!(
            f.commands.execute(A, Command::Claim { object: ObjectId(42) }),
            Reply::NoObjects
        );
    }

    #[test]
    fn test_claim_limit_reply() {
        let f = fixture(ClaimPolicy::default());
        f.commands.execute(B, Command::Claim { object: ObjectId(1) });
        f.commands.execute(B, Command::Claim { object: ObjectId(2) });

        assert_eq!(
            f.commands.execute(B, Command::Claim { object: ObjectId(3) }),
            Reply::LimitReached { threshold: 2 }
        );
    }

    #[test]
    fn test_spawn_claims_for_claimers() {
        let f = fixture(ClaimPolicy::default());
        f.host.place_actor(A, Position::new(10.0, 0.0, 10.0));

        assert_eq!(f.commands.execute(A, Command::Spawn), Reply::Spawned { claimed: true });
        assert_eq!(f.registry.claim_count(A), 1);
    }

    #[test]
    fn test_spawn_without_claim_permission() {
        let f = fixture(ClaimPolicy::default());
        let spawner = ActorId(300);
        f.grants.grant(spawner, Permission::Spawn);
        f.host.place_actor(spawner, Position::default());

        assert_eq!(
            f.commands.execute(spawner, Command::Spawn),
            Reply::Spawned { claimed: false }
        );
        assert!(f.registry.is_empty());
    }

    #[test]
    fn test_spawn_at_limit_and_failure() {
        let f = fixture(ClaimPolicy::default());
        // A is privileged: threshold 5
        for object in 1..=5 {
            f.registry.claim(ObjectId(object), A).unwrap();
        }
        assert_eq!(
            f.commands.execute(A, Command::Spawn),
            Reply::LimitReached { threshold: 5 }
        );

        f.registry.release(ObjectId(1), A).unwrap();
        // the fake host cannot place an actor it has never seen
        assert_eq!(f.commands.execute(A, Command::Spawn), Reply::SpawnFailed);
    }

    #[test]
    fn test_remove_only_own() {
        let f = fixture(ClaimPolicy::default());
        f.registry.claim(ObjectId(1), B).unwrap();
        f.registry.claim(ObjectId(2), A).unwrap();

        assert_eq!(
            f.commands.execute(A, Command::Remove { object: ObjectId(1) }),
            Reply::NotYours
        );
        assert!(f.host.exists(ObjectId(1)));

        assert_eq!(
            f.commands.execute(A, Command::Remove { object: ObjectId(2) }),
            Reply::Removed
        );
        assert!(!f.host.exists(ObjectId(2)));
        assert_eq!(f.registry.lookup(ObjectId(2)), None);
    }

    #[test]
    fn test_find_reports_distance_and_grid() {
        let f = fixture(ClaimPolicy::default());
        assert_eq!(f.commands.execute(A, Command::Find), Reply::NoObjects);

        f.registry.claim(ObjectId(3), A).unwrap();
        f.host.place(ObjectId(3), Position::new(0.0, 0.0, 0.0));
        f.host.place_actor(A, Position::new(30.0, 0.0, 40.0));

        assert_eq!(
            f.commands.execute(A, Command::Find),
            Reply::Found {
                distance: 50,
                grid: "N13".to_string()
            }
        );
    }

    #[test]
    fn test_info() {
        let f = fixture(ClaimPolicy::default());
        assert_eq!(
            f.commands.execute(A, Command::Info { object: ObjectId(1) }),
            Reply::Info {
                health: 50.0,
                owner: None,
                lease_remaining: None
            }
        );

        f.registry.claim(ObjectId(1), B).unwrap();
        assert_eq!(
            f.commands.execute(A, Command::Info { object: ObjectId(1) }),
            Reply::Info {
                health: 100.0,
                owner: Some("player200".to_string()),
                lease_remaining: None
            }
        );
    }

    #[test]
    fn test_info_reports_lease() {
        let mut policy = ClaimPolicy::default();
        policy.lease.enabled = true;
        let f = fixture(policy);
        f.registry.claim(ObjectId(1), A).unwrap();

        let Reply::Info {
            lease_remaining: Some(remaining),
            ..
        } = f.commands.execute(A, Command::Info { object: ObjectId(1) })
        else {
            panic!("expected lease info");
        };
        assert!(remaining <= Duration::from_secs(600));
        assert!(remaining > Duration::from_secs(590));
    }

    #[test]
    fn test_command_json_shape() {
        let command: Command =
            serde_json::from_str(r#"{"name":"claim","object":7}"#).unwrap();
        assert_eq!(command, Command::Claim { object: ObjectId(7) });

        let command: Command = serde_json::from_str(r#"{"name":"find"}"#).unwrap();
        assert_eq!(command, Command::Find);
    }
}
