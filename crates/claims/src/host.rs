//! Host environment boundary.
//!
//! The engine never owns objects. It reads and writes them through these
//! traits, which the hosting environment implements.

use crate::{ActorId, ObjectId};
use policy::Permission;

/// Health an object is restored to when it is claimed.
pub const FULL_HEALTH: f32 = 100.0;

/// Who is riding an object right now, as far as the host can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    Occupied(ActorId),
    Unoccupied,
    /// The object or its rider could not be looked up.
    Unresolvable,
}

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Object lifecycle collaborator.
///
/// Implementations use interior mutability; the registry calls these while
/// holding its own lock, so they must not call back into the registry.
pub trait ObjectHost: Send + Sync {
    /// Whether the object still exists.
    fn exists(&self, object: ObjectId) -> bool;

    /// The object's own owner attribute, if the object exists.
    fn owner_of(&self, object: ObjectId) -> Option<ActorId>;

    /// Overwrite the object's owner attribute.
    fn set_owner(&self, object: ObjectId, owner: ActorId);

    fn set_health(&self, object: ObjectId, health: f32);

    /// Probe who occupies the object.
    fn occupancy(&self, object: ObjectId) -> Occupancy;

    /// All leaseable objects whose owner attribute is non-zero.
    fn owned_objects(&self) -> Vec<(ObjectId, ActorId)>;
}

/// The wider host surface needed by player commands.
pub trait CommandHost: ObjectHost {
    /// Spawn a new object next to the actor.
    fn spawn_near(&self, actor: ActorId) -> Option<ObjectId>;

    /// Destroy an object outright.
    fn destroy(&self, object: ObjectId);

    fn health(&self, object: ObjectId) -> Option<f32>;

    fn object_position(&self, object: ObjectId) -> Option<Position>;

    fn actor_position(&self, actor: ActorId) -> Option<Position>;

    /// Edge length of the square world, used for grid labels.
    fn world_size(&self) -> f32;

    fn display_name(&self, _actor: ActorId) -> Option<String> {
        None
    }

    /// Grid label from an external map service, if one is installed.
    fn grid_label(&self, _position: Position) -> Option<String> {
        None
    }
}

/// Permission/privilege check.
pub trait PermissionProvider: Send + Sync {
    fn has_permission(&self, actor: ActorId, permission: Permission) -> bool;
}
