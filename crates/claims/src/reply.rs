//! Fixed user-facing replies.

use std::fmt;
use std::time::Duration;

/// What an actor is told after a command or a gated action.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    NotAuthorized,
    Claimed,
    LimitReached { threshold: u32 },
    Released,
    AlreadyYours,
    WelcomeBack,
    Spawned { claimed: bool },
    SpawnFailed,
    Removed,
    OwnedByOther,
    NotYours,
    NoObjects,
    Found { distance: u32, grid: String },
    Info {
        health: f32,
        owner: Option<String>,
        lease_remaining: Option<Duration>,
    },
    Failed(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::NotAuthorized => write!(f, "You are not authorized for this command!"),
            Reply::Claimed => write!(f, "You have claimed this ride!"),
            Reply::LimitReached { threshold } => {
                write!(f, "You have reached the limit for claiming rides ({threshold})!")
            }
            Reply::Released => write!(f, "You have released this ride!"),
            Reply::AlreadyYours => write!(f, "You have already claimed this ride!"),
            Reply::WelcomeBack => write!(f, "Well, hello there."),
            Reply::Spawned { claimed: true } => write!(f, "You have spawned and claimed a ride!"),
            Reply::Spawned { claimed: false } => write!(f, "You have spawned a ride!"),
            Reply::SpawnFailed => write!(f, "The ride could not be spawned."),
            Reply::Removed => write!(f, "Your ride has been removed."),
            Reply::OwnedByOther => write!(f, "Someone else owns this ride!"),
            Reply::NotYours => write!(f, "Someone else owns this ride. Perhaps no one..."),
            Reply::NoObjects => write!(f, "No rides found."),
            Reply::Found { distance, grid } => {
                write!(f, "Your ride is {distance}m away in {grid}.")
            }
            Reply::Info {
                health,
                owner,
                lease_remaining,
            } => {
                let owner = owner.as_deref().unwrap_or("Server-owned, free ride.");
                write!(f, "Health: {health:.0}\n  Owner: {owner}")?;
                if let Some(remaining) = lease_remaining {
                    write!(f, "\n  Release in: {}s", remaining.as_secs())?;
                }
                Ok(())
            }
            Reply::Failed(reason) => write!(f, "Something went wrong: {reason}"),
        }
    }
}
