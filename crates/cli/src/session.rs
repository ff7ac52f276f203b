//! JSON-lines event session.
//!
//! Each input line is one event. World facts (players, social ties, grants)
//! update the simulated world; lifecycle events and commands go through the
//! engine. Every line yields exactly one line of output.

use crate::world::SimWorld;
use claims::{
    ActorId, Command, DamageAttempt, Engine, EventOutcome, HostEvent, ObjectId, Position,
};
use policy::{Decision, Permission};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Input {
    Player {
        actor: ActorId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        at: Option<[f32; 3]>,
    },
    Friends {
        a: ActorId,
        b: ActorId,
    },
    Clan {
        actor: ActorId,
        tag: String,
    },
    Team {
        actor: ActorId,
        team: u64,
    },
    Grant {
        actor: ActorId,
        permissions: Vec<Permission>,
    },
    Spawned {
        #[serde(default)]
        object: Option<ObjectId>,
        #[serde(default)]
        owner: Option<ActorId>,
        #[serde(default)]
        at: Option<[f32; 3]>,
    },
    Destroyed {
        object: ObjectId,
    },
    Damage {
        object: ObjectId,
        #[serde(default)]
        amount: f32,
        #[serde(default)]
        attempt: DamageAttempt,
    },
    Mount {
        object: ObjectId,
        actor: ActorId,
    },
    Dismount {
        object: ObjectId,
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

fn position(at: Option<[f32; 3]>) -> Option<Position> {
    at.map(|[x, y, z]| Position::new(x, y, z))
}

pub struct Session {
    engine: Engine,
    world: Arc<SimWorld>,
}

impl Session {
    pub fn new(engine: Engine, world: Arc<SimWorld>) -> Self {
        Self { engine, world }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Apply one input and describe the result.
    pub fn apply(&self, input: Input) -> String {
        debug!(?input, "input");
        match input {
            Input::Player { actor, name, at } => {
                self.world.upsert_player(actor, name, position(at));
                ok()
            }
            Input::Friends { a, b } => {
                self.world.befriend(a, b);
                ok()
            }
            Input::Clan { actor, tag } => {
                self.world.set_clan(actor, tag);
                ok()
            }
            Input::Team { actor, team } => {
                self.world.set_team(actor, team);
                ok()
            }
            Input::Grant { actor, permissions } => {
                self.world.grant(actor, permissions);
                ok()
            }
            Input::Spawned { object, owner, at } => {
                let object = self.world.add_object(
                    object,
                    owner.unwrap_or(ActorId::SERVER),
                    position(at).unwrap_or_default(),
                );
                self.engine.handle(HostEvent::Spawned { object });
                format!("spawned {object}")
            }
            Input::Destroyed { object } => {
                self.world.remove_object(object);
                self.handle(HostEvent::Destroyed { object })
            }
            Input::Damage {
                object,
                amount,
                attempt,
            } => {
                let outcome = self.engine.handle(HostEvent::Damage { object, attempt });
                if is_allowed(&outcome) {
                    self.world.damage(object, amount);
                }
                outcome.to_string()
            }
            Input::Mount { object, actor } => {
                let check = self.engine.handle(HostEvent::MountAttempt { object, actor });
                if !is_allowed(&check) {
                    return check.to_string();
                }
                self.world.set_rider(object, Some(actor));
                self.handle(HostEvent::Mounted { object, actor })
            }
            Input::Dismount { object } => {
                self.world.set_rider(object, None);
                ok()
            }
            Input::Loot { object, actor } => self.handle(HostEvent::Loot { object, actor }),
            Input::Command { actor, command } => self.handle(HostEvent::Command { actor, command }),
            Input::NewSave => self.handle(HostEvent::NewSave),
        }
    }

    fn handle(&self, event: HostEvent) -> String {
        self.engine.handle(event).to_string()
    }
}

fn ok() -> String {
    EventOutcome::Handled.to_string()
}

fn is_allowed(outcome: &EventOutcome) -> bool {
    matches!(outcome, EventOutcome::Decision(Decision::Allow))
}
