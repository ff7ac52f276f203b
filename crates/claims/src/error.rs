//! Claim engine error types.

use crate::{ActorId, ObjectId};
use thiserror::Error;

/// Errors returned by claim operations.
///
/// Every variant is recoverable: callers turn them into a reply for the
/// actor and carry on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClaimError {
    /// The actor already holds this object.
    #[error("object {object} is already claimed by {actor}")]
    AlreadyClaimed { object: ObjectId, actor: ActorId },

    /// Someone else holds this object.
    #[error("object {object} is owned by {owner}")]
    OwnedByOther { object: ObjectId, owner: ActorId },

    /// The actor holds as many claims as their limit allows.
    #[error("claim limit reached ({current} of {threshold})")]
    LimitReached { current: usize, threshold: u32 },

    /// The actor tried to release an object they do not own.
    #[error("actor {actor} does not own object {object}")]
    NotOwner { object: ObjectId, actor: ActorId },

    /// The object (or its occupant) does not exist in the host.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server identity cannot hold claims.
    #[error("actor {0} cannot hold claims")]
    InvalidActor(ActorId),

    /// A relationship or permission source is not installed.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(&'static str),

    /// The scheduler could not be created.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Storage(#[from] storage::Error),
}

pub type Result<T> = std::result::Result<T, ClaimError>;
