//! Ownership and lease engine for shared ridable objects.
//!
//! Actors claim objects that the host environment owns and simulates. The
//! engine keeps the authoritative object → owner table, enforces per-actor
//! limits, optionally expires claims that are no longer used, and answers
//! access questions for damage, storage and mounting.
//!
//! # Components
//!
//! - [`ClaimRegistry`] owns every claim and every lease, and writes the whole
//!   table through to a [`storage::ResourceStore`] after each change.
//! - [`RelationshipResolver`] decides whether one actor may use another's
//!   object, via optional friends, clan and team providers.
//! - [`AccessGate`] turns registry state and relationships into
//!   [`policy::Decision`]s.
//! - [`CommandSurface`] implements the permission-gated player commands.
//! - [`Engine`] dispatches [`HostEvent`]s to all of the above.
//!
//! The host is reached only through [`ObjectHost`] and [`CommandHost`].
//! Timers go through a [`Scheduler`]: [`TokioScheduler`] for async hosts,
//! [`ManualScheduler`] for hosts that drive their own clock.
//!
//! # Example
//!
//! ```ignore
//! use claims::{ClaimRegistry, Engine, ManualScheduler, RelationshipResolver};
//!
//! let registry = ClaimRegistry::builder(policy.clone(), store, world.clone(), scheduler)
//!     .permissions(grants)
//!     .build()?;
//! let engine = Engine::new(registry, RelationshipResolver::new(policy.relationships), world);
//! let outcome = engine.handle(event);
//! ```

mod commands;
mod engine;
mod error;
mod gate;
mod grid;
mod host;
mod ids;
mod lease;
mod registry;
mod relationship;
mod reply;
mod schedule;

#[cfg(test)]
mod testing;

pub use commands::{Command, CommandSurface};
pub use engine::{Engine, EventOutcome, HostEvent};
pub use error::{ClaimError, Result};
pub use gate::{AccessGate, DamageAttempt, DamageKind, MountOutcome, StructureZone};
pub use grid::{CELL_SIZE, grid_label, position_to_grid};
pub use host::{CommandHost, FULL_HEALTH, ObjectHost, Occupancy, PermissionProvider, Position};
pub use ids::{ActorId, ObjectId};
pub use lease::{LeaseId, LeaseInfo};
pub use registry::{Claim, ClaimRegistry, ClaimRegistryBuilder};
pub use relationship::{ClanProvider, FriendsProvider, Relation, RelationshipResolver, TeamProvider};
pub use reply::Reply;
pub use schedule::{ManualScheduler, Scheduler, Task, TaskHandle, TokioScheduler};
