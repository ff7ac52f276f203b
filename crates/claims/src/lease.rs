//! Lease records for timed auto-release.
//!
//! ```text
//! claim ──> Armed ──countdown──> Expired-Evaluating ──owner riding──> Armed (new lease)
//!             │                          │
//!     release │                          └──otherwise──> released
//!             v
//!         cancelled
//! ```

use crate::schedule::TaskHandle;
use crate::{ActorId, ObjectId};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identity of one armed countdown.
///
/// Every arm, including a re-arm, gets a fresh id; an expiry callback only
/// acts if the live lease still carries the id it was scheduled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(Uuid);

impl LeaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LeaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An armed countdown on a claimed object.
///
/// Dropping a lease cancels its timer.
#[derive(Debug)]
pub(crate) struct Lease {
    info: LeaseInfo,
    timer: Option<TaskHandle>,
}

impl Lease {
    pub(crate) fn new(info: LeaseInfo, timer: TaskHandle) -> Self {
        Self {
            info,
            timer: Some(timer),
        }
    }

    pub(crate) fn info(&self) -> &LeaseInfo {
        &self.info
    }

    /// Consume a lease whose timer is the one currently running.
    pub(crate) fn fired(mut self) -> LeaseInfo {
        self.timer = None;
        self.info.clone()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Snapshot of a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseInfo {
    pub id: LeaseId,
    pub object: ObjectId,
    pub owner: ActorId,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl LeaseInfo {
    pub fn new(object: ObjectId, owner: ActorId, duration: Duration) -> Self {
        Self {
            id: LeaseId::new(),
            object,
            owner,
            started_at: Utc::now(),
            duration,
        }
    }

    /// Time left on the countdown at `now`, saturating at zero.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = (now - self.started_at).to_std().unwrap_or_default();
        self.duration.saturating_sub(elapsed)
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(Utc::now())
    }
}
