//! # Timers
//!
//! The channel never sleeps itself. It asks a [`Scheduler`] to run a task
//! once after a delay and cancels it by id. [`TokioScheduler`] backs this with
//! spawned sleep tasks; [`ManualScheduler`] is a virtual clock driven by
//! [`ManualScheduler::advance`].

use crate::lock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::AbortHandle;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerId;

    /// Drop a scheduled task; unknown or already-fired ids are ignored
    fn cancel(&self, id: TimerId);

    /// Monotonic time since the scheduler was created
    fn now(&self) -> Duration;
}

/// Scheduler running timers on a tokio runtime
pub struct TokioScheduler {
    handle: Handle,
    started: tokio::time::Instant,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<u64, AbortHandle>>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            started: tokio::time::Instant::now(),
            next_id: AtomicU64::new(1),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Scheduler on the runtime of the calling context
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    pub fn pending(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = self.timers.clone();

        // Held across spawn so a zero delay can't fire before registration
        let mut registry = lock(&self.timers);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let live = lock(&timers).remove(&id).is_some();
            if live {
                task();
            }
        });
        registry.insert(id, join.abort_handle());
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        if let Some(handle) = lock(&self.timers).remove(&id.0) {
            handle.abort();
        }
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), Task>,
}

/// Virtual clock for deterministic tests and simulations
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward, running every task that comes due in deadline
    /// order. Tasks scheduled by running tasks fire too if they fall inside
    /// the window.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.state).now + by;
        loop {
            let due = {
                let mut state = lock(&self.state);
                match state.queue.keys().next().copied() {
                    Some(key) if key.0 <= target => {
                        state.now = key.0;
                        state.queue.remove(&key)
                    }
                    _ => {
                        state.now = target;
                        None
                    }
                }
            };
            match due {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Number of tasks still waiting
    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerId {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        let deadline = state.now + delay;
        state.queue.insert((deadline, id), task);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        lock(&self.state).queue.retain(|(_, tid), _| *tid != id.0);
    }

    fn now(&self) -> Duration {
        lock(&self.state).now
    }
}
