//! Event dispatch over the registry, gate and commands.

use crate::commands::{Command, CommandSurface};
use crate::gate::{AccessGate, DamageAttempt, MountOutcome};
use crate::host::CommandHost;
use crate::registry::ClaimRegistry;
use crate::relationship::RelationshipResolver;
use crate::reply::Reply;
use crate::{ActorId, ObjectId};
use policy::Decision;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A lifecycle event or command delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    Spawned {
        object: ObjectId,
    },
    Destroyed {
        object: ObjectId,
    },
    Damage {
        object: ObjectId,
        #[serde(default)]
        attempt: DamageAttempt,
    },
    MountAttempt {
        object: ObjectId,
        actor: ActorId,
    },
    Mounted {
        object: ObjectId,
        actor: ActorId,
    },
    Loot {
        object: ObjectId,
        actor: ActorId,
    },
    Command {
        actor: ActorId,
        command: Command,
    },
    NewSave,
}

/// The engine's answer to a [`HostEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Nothing for the host to act on.
    Handled,
    Decision(Decision),
    Mount(MountOutcome),
    Reply(Reply),
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventOutcome::Handled => write!(f, "ok"),
            EventOutcome::Decision(Decision::Allow) => write!(f, "allow"),
            EventOutcome::Decision(Decision::Deny { reason }) => write!(f, "deny: {reason}"),
            EventOutcome::Mount(outcome) => match outcome.reply() {
                Some(reply) => write!(f, "{reply}"),
                None => write!(f, "ok"),
            },
            EventOutcome::Reply(reply) => write!(f, "{reply}"),
        }
    }
}

/// One running claim service.
#[derive(Clone)]
pub struct Engine {
    registry: ClaimRegistry,
    gate: AccessGate,
    commands: CommandSurface,
}

impl Engine {
    pub fn new(
        registry: ClaimRegistry,
        resolver: RelationshipResolver,
        world: Arc<dyn CommandHost>,
    ) -> Self {
        Self {
            gate: AccessGate::new(registry.clone(), resolver),
            commands: CommandSurface::new(registry.clone(), world),
            registry,
        }
    }

    pub fn registry(&self) -> &ClaimRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn commands(&self) -> &CommandSurface {
        &self.commands
    }

    pub fn handle(&self, event: HostEvent) -> EventOutcome {
        debug!(?event, "handling event");
        match event {
            HostEvent::Spawned { object } => {
                self.registry.on_spawned(object);
                EventOutcome::Handled
            }
            HostEvent::Destroyed { object } => {
                self.registry.on_destroyed(object);
                EventOutcome::Handled
            }
            HostEvent::Damage { object, attempt } => {
                EventOutcome::Decision(self.gate.damage_check(object, &attempt))
            }
            HostEvent::MountAttempt { object, actor } => {
                EventOutcome::Decision(self.gate.mount_check(object, actor))
            }
            HostEvent::Mounted { object, actor } => {
                EventOutcome::Mount(self.gate.on_mounted(object, actor))
            }
            HostEvent::Loot { object, actor } => {
                EventOutcome::Decision(self.gate.loot_check(object, actor))
            }
            HostEvent::Command { actor, command } => {
                EventOutcome::Reply(self.commands.execute(actor, command))
            }
            HostEvent::NewSave => {
                info!("new save, clearing all claims");
                self.registry.reset();
                EventOutcome::Handled
            }
        }
    }

    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
