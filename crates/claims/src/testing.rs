//! In-memory host for engine tests.

use crate::host::{CommandHost, ObjectHost, Occupancy, PermissionProvider, Position};
use crate::{ActorId, ObjectId};
use policy::Permission;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct FakeObject {
    owner: ActorId,
    health: f32,
    rider: Option<ActorId>,
    unresolvable: bool,
    position: Position,
}

impl FakeObject {
    fn new() -> Self {
        Self {
            owner: ActorId::SERVER,
            health: 50.0,
            rider: None,
            unresolvable: false,
            position: Position::default(),
        }
    }
}

#[derive(Default)]
struct World {
    objects: HashMap<ObjectId, FakeObject>,
    actors: HashMap<ActorId, Position>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeHost {
    world: Mutex<World>,
}

impl FakeHost {
    pub fn with_objects(ids: impl IntoIterator<Item = u64>) -> Self {
        let host = Self::default();
        {
            let mut world = host.world();
            for id in ids {
                world.objects.insert(ObjectId(id), FakeObject::new());
                world.next_id = world.next_id.max(id);
            }
        }
        host
    }

    pub fn remove(&self, object: ObjectId) {
        self.world().objects.remove(&object);
    }

    pub fn mount(&self, object: ObjectId, actor: ActorId) {
        if let Some(o) = self.world().objects.get_mut(&object) {
            o.rider = Some(actor);
        }
    }

    pub fn dismount(&self, object: ObjectId) {
        if let Some(o) = self.world().objects.get_mut(&object) {
            o.rider = None;
        }
    }

    pub fn break_occupancy(&self, object: ObjectId) {
        if let Some(o) = self.world().objects.get_mut(&object) {
            o.unresolvable = true;
        }
    }

    pub fn health_of(&self, object: ObjectId) -> Option<f32> {
        self.world().objects.get(&object).map(|o| o.health)
    }

    pub fn place(&self, object: ObjectId, position: Position) {
        if let Some(o) = self.world().objects.get_mut(&object) {
            o.position = position;
        }
    }

    pub fn place_actor(&self, actor: ActorId, position: Position) {
        self.world().actors.insert(actor, position);
    }

    fn world(&self) -> std::sync::MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }
}

impl ObjectHost for FakeHost {
    fn exists(&self, object: ObjectId) -> bool {
        self.world().objects.contains_key(&object)
    }

    fn owner_of(&self, object: ObjectId) -> Option<ActorId> {
        self.world().objects.get(&object).map(|o| o.owner)
    }

    fn set_owner(&self, object: ObjectId, owner: ActorId) {
        if let Some(o) = self.world().objects.get_mut(&object) {
            o.owner = owner;
        }
    }

    fn set_health(&self, object: ObjectId, health: f32) {
        if let Some(o) = self.world().objects.get_mut(&object) {
            o.health = health;
        }
    }

    fn occupancy(&self, object: ObjectId) -> Occupancy {
        match self.world().objects.get(&object) {
            None => Occupancy::Unresolvable,
            Some(o) if o.unresolvable => Occupancy::Unresolvable,
            Some(o) => o.rider.map_or(Occupancy::Unoccupied, Occupancy::Occupied),
        }
    }

    fn owned_objects(&self) -> Vec<(ObjectId, ActorId)> {
        self.world()
            .objects
            .iter()
            .filter(|(_, o)| !o.owner.is_server())
            .map(|(id, o)| (*id, o.owner))
            .collect()
    }
}

impl CommandHost for FakeHost {
    fn spawn_near(&self, actor: ActorId) -> Option<ObjectId> {
        let mut world = self.world();
        let position = world.actors.get(&actor).copied()?;
        world.next_id += 1;
        let id = ObjectId(world.next_id);
        let mut object = FakeObject::new();
        object.position = Position::new(position.x + 2.0, position.y, position.z);
        world.objects.insert(id, object);
        Some(id)
    }

    fn destroy(&self, object: ObjectId) {
        self.remove(object);
    }

    fn health(&self, object: ObjectId) -> Option<f32> {
        self.health_of(object)
    }

    fn object_position(&self, object: ObjectId) -> Option<Position> {
        self.world().objects.get(&object).map(|o| o.position)
    }

    fn actor_position(&self, actor: ActorId) -> Option<Position> {
        self.world().actors.get(&actor).copied()
    }

    fn world_size(&self) -> f32 {
        4000.0
    }

    fn display_name(&self, actor: ActorId) -> Option<String> {
        Some(format!("player{actor}"))
    }
}

/// Permission grants keyed by actor.
#[derive(Default)]
pub struct Grants {
    granted: Mutex<HashSet<(ActorId, Permission)>>,
}

impl Grants {
    pub fn grant(&self, actor: ActorId, permission: Permission) {
        self.granted.lock().unwrap().insert((actor, permission));
    }

    pub fn grant_all(&self, actor: ActorId) {
        for permission in Permission::ALL {
            self.grant(actor, permission);
        }
    }
}

impl PermissionProvider for Grants {
    fn has_permission(&self, actor: ActorId, permission: Permission) -> bool {
        self.granted.lock().unwrap().contains(&(actor, permission))
    }
}
