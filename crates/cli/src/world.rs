//! In-process world model driven by the event stream.
//!
//! Stands in for a game server: it holds objects, players, social ties and
//! permission grants, and serves them to the engine through the host traits.

use claims::{
    ActorId, ClanProvider, CommandHost, FriendsProvider, ObjectHost, ObjectId, Occupancy,
    PermissionProvider, Position, TeamProvider,
};
use policy::Permission;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default edge length of the simulated map.
pub const WORLD_SIZE: f32 = 4000.0;

/// Health of a freshly spawned object.
const SPAWN_HEALTH: f32 = 100.0;

#[derive(Debug, Clone)]
struct SimObject {
    owner: ActorId,
    health: f32,
    rider: Option<ActorId>,
    position: Position,
}

#[derive(Debug, Clone, Default)]
struct Player {
    name: Option<String>,
    position: Position,
}

#[derive(Default)]
struct State {
    objects: HashMap<ObjectId, SimObject>,
    players: HashMap<ActorId, Player>,
    friends: HashSet<(ActorId, ActorId)>,
    clans: HashMap<ActorId, String>,
    teams: HashMap<ActorId, u64>,
    grants: HashMap<ActorId, HashSet<Permission>>,
    next_id: u64,
}

pub struct SimWorld {
    size: f32,
    state: Mutex<State>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(WORLD_SIZE)
    }
}

impl SimWorld {
    pub fn new(size: f32) -> Self {
        Self {
            size,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_grants(self, grants: HashMap<ActorId, HashSet<Permission>>) -> Self {
        self.state().grants = grants;
        self
    }

    /// Add an object, allocating an id when none is given.
    ///
    /// Re-adding a known id only moves it; owner, health and rider stay.
    pub fn add_object(
        &self,
        object: Option<ObjectId>,
        owner: ActorId,
        position: Position,
    ) -> ObjectId {
        let mut state = self.state();
        let id = match object {
            Some(id) => id,
            None => ObjectId(state.next_id + 1),
        };
        state.next_id = state.next_id.max(id.0);
        state
            .objects
            .entry(id)
            .and_modify(|o| o.position = position)
            .or_insert(SimObject {
                owner,
                health: SPAWN_HEALTH,
                rider: None,
                position,
            });
        id
    }

    pub fn remove_object(&self, object: ObjectId) -> bool {
        self.state().objects.remove(&object).is_some()
    }

    pub fn set_rider(&self, object: ObjectId, rider: Option<ActorId>) {
        if let Some(o) = self.state().objects.get_mut(&object) {
            o.rider = rider;
        }
    }

    pub fn damage(&self, object: ObjectId, amount: f32) {
        if let Some(o) = self.state().objects.get_mut(&object) {
            o.health = (o.health - amount).max(0.0);
        }
    }

    pub fn upsert_player(&self, actor: ActorId, name: Option<String>, position: Option<Position>) {
        let mut state = self.state();
        let player = state.players.entry(actor).or_default();
        if name.is_some() {
            player.name = name;
        }
        if let Some(position) = position {
            player.position = position;
        }
    }

    /// Record a mutual friendship.
    pub fn befriend(&self, a: ActorId, b: ActorId) {
        let mut state = self.state();
        state.friends.insert((a, b));
        state.friends.insert((b, a));
    }

    pub fn set_clan(&self, actor: ActorId, tag: String) {
        self.state().clans.insert(actor, tag);
    }

    pub fn set_team(&self, actor: ActorId, team: u64) {
        self.state().teams.insert(actor, team);
    }

    pub fn grant(&self, actor: ActorId, permissions: impl IntoIterator<Item = Permission>) {
        self.state()
            .grants
            .entry(actor)
            .or_default()
            .extend(permissions);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectHost for SimWorld {
    fn exists(&self, object: ObjectId) -> bool {
        self.state().objects.contains_key(&object)
    }

    fn owner_of(&self, object: ObjectId) -> Option<ActorId> {
        self.state().objects.get(&object).map(|o| o.owner)
    }

    fn set_owner(&self, object: ObjectId, owner: ActorId) {
        if let Some(o) = self.state().objects.get_mut(&object) {
            o.owner = owner;
        }
    }

    fn set_health(&self, object: ObjectId, health: f32) {
        if let Some(o) = self.state().objects.get_mut(&object) {
            o.health = health;
        }
    }

    fn occupancy(&self, object: ObjectId) -> Occupancy {
        let state = self.state();
        let Some(o) = state.objects.get(&object) else {
            return Occupancy::Unresolvable;
        };
        match o.rider {
            // a rider who has left the world cannot be verified
            Some(rider) if !state.players.contains_key(&rider) => Occupancy::Unresolvable,
            Some(rider) => Occupancy::Occupied(rider),
            None => Occupancy::Unoccupied,
        }
    }

    fn owned_objects(&self) -> Vec<(ObjectId, ActorId)> {
        self.state()
            .objects
            .iter()
            .filter(|(_, o)| !o.owner.is_server())
            .map(|(id, o)| (*id, o.owner))
            .collect()
    }
}

impl CommandHost for SimWorld {
    fn spawn_near(&self, actor: ActorId) -> Option<ObjectId> {
        let at = self.actor_position(actor)?;
        let position = Position::new(at.x + 2.0, at.y, at.z);
        Some(self.add_object(None, ActorId::SERVER, position))
    }

    fn destroy(&self, object: ObjectId) {
        self.remove_object(object);
    }

    fn health(&self, object: ObjectId) -> Option<f32> {
        self.state().objects.get(&object).map(|o| o.health)
    }

    fn object_position(&self, object: ObjectId) -> Option<Position> {
        self.state().objects.get(&object).map(|o| o.position)
    }

    fn actor_position(&self, actor: ActorId) -> Option<Position> {
        self.state().players.get(&actor).map(|p| p.position)
    }

    fn world_size(&self) -> f32 {
        self.size
    }

    fn display_name(&self, actor: ActorId) -> Option<String> {
        self.state().players.get(&actor).and_then(|p| p.name.clone())
    }
}

impl FriendsProvider for SimWorld {
    fn are_friends(&self, a: ActorId, b: ActorId) -> bool {
        self.state().friends.contains(&(a, b))
    }
}

impl ClanProvider for SimWorld {
    fn clan_of(&self, actor: ActorId) -> Option<String> {
        self.state().clans.get(&actor).cloned()
    }
}

impl TeamProvider for SimWorld {
    fn team_members(&self, actor: ActorId) -> Option<HashSet<ActorId>> {
        let state = self.state();
        let team = state.teams.get(&actor)?;
        Some(
            state
                .teams
                .iter()
                .filter(|(_, t)| *t == team)
                .map(|(member, _)| *member)
                .collect(),
        )
    }
}

impl PermissionProvider for SimWorld {
    fn has_permission(&self, actor: ActorId, permission: Permission) -> bool {
        self.state()
            .grants
            .get(&actor)
            .is_some_and(|granted| granted.contains(&permission))
    }
}
