//! One-shot task scheduling for lease timers.
//!
//! Tasks never repeat. Re-arming a lease schedules a brand new task.

use crate::{ClaimError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Work to run once a delay has elapsed.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot tasks.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;
}

/// Cancellation handle for a scheduled task.
///
/// Cancelling is synchronous: once [`TaskHandle::cancel`] returns, the task
/// will not start.
#[derive(Debug)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    pub(crate) fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| ClaimError::Scheduler(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });
        TaskHandle::new(cancelled, Some(join.abort_handle()))
    }
}

struct Pending {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// A scheduler driven by the host's own clock.
///
/// Tick-based hosts call [`ManualScheduler::advance`] from their update loop;
/// tests use it to fire lease expiries deterministically.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.clock().now
    }

    /// Number of tasks still waiting to run.
    pub fn pending(&self) -> usize {
        self.clock()
            .pending
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move the clock forward, running every task that falls due in order.
    ///
    /// Tasks scheduled by a running task fire within the same call if their
    /// due time is reached. Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock().now + by;
        let mut fired = 0;

        loop {
            let next = {
                let mut clock = self.clock();
                clock.pending.retain(|p| !p.cancelled.load(Ordering::SeqCst));
                let due = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                due.map(|i| {
                    let pending = clock.pending.swap_remove(i);
                    clock.now = pending.due;
                    pending
                })
            };

            // The lock is released before running so the task may schedule.
            let Some(pending) = next else { break };
            (pending.task)();
            fired += 1;
        }

        self.clock().now = target;
        fired
    }

    fn clock(&self) -> std::sync::MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.clock();
        let seq = clock.next_seq;
        clock.next_seq += 1;
        let due = clock.now + delay;
        clock.pending.push(Pending {
            due,
            seq,
            cancelled: cancelled.clone(),
            task,
        });
        TaskHandle::new(cancelled, None)
    }
}
