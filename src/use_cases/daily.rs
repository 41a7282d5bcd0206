// Once-a-day callback hooks owned by active games.

use chrono::{DateTime, Local, NaiveTime, TimeDelta};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

type DailyCallback = Box<dyn Fn() + Send + Sync>;

struct HookInner {
    callbacks: Mutex<Vec<DailyCallback>>,
    released: AtomicBool,
    shutdown: Notify,
    // Shared with the scheduler so it can report live hooks.
    live: Arc<AtomicUsize>,
}

impl HookInner {
    fn fire(&self) {
        let callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        for callback in callbacks.iter() {
            callback();
        }
    }
}

/// Handle to a recurring daily hook. Clones share the same hook.
///
/// Nothing is released on drop; owners call [`DailyHandle::release`].
#[derive(Clone)]
pub struct DailyHandle {
    inner: Arc<HookInner>,
}

impl std::fmt::Debug for DailyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

impl DailyHandle {
    /// Registers a callback. Callbacks fire in registration order.
    pub fn on<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut callbacks = self.inner.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        callbacks.push(Box::new(callback));
        self
    }

    /// Fires every registered callback right away.
    pub fn invoke_now(&self) {
        self.inner.fire();
    }

    /// Cancels all pending and future firings. Safe to call more than once.
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.live.fetch_sub(1, Ordering::AcqRel);
        // notify_one keeps a permit if the timer task is not waiting yet.
        self.inner.shutdown.notify_one();
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }
}

/// Spawns daily hooks on the tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct DailyScheduler {
    live: Arc<AtomicUsize>,
}

impl DailyScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a hook that fires at the next local `time_of_day` and every 24h after that.
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, time_of_day: NaiveTime) -> DailyHandle {
        let inner = Arc::new(HookInner {
            callbacks: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
            shutdown: Notify::new(),
            live: self.live.clone(),
        });
        self.live.fetch_add(1, Ordering::AcqRel);

        let first = until_next(Local::now(), time_of_day);
        debug!(first_in_secs = first.as_secs(), %time_of_day, "daily hook scheduled");
        tokio::spawn(run_hook(inner.clone(), first));

        DailyHandle { inner }
    }

    /// Number of hooks scheduled and not yet released.
    pub fn live_hooks(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

async fn run_hook(inner: Arc<HookInner>, first: Duration) {
    tokio::select! {
        _ = inner.shutdown.notified() => return,
        _ = tokio::time::sleep(first) => {}
    }
    if inner.released.load(Ordering::Acquire) {
        return;
    }
    inner.fire();

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + DAY, DAY);
    loop {
        tokio::select! {
            _ = inner.shutdown.notified() => break,
            _ = interval.tick() => {
                if inner.released.load(Ordering::Acquire) {
                    break;
                }
                inner.fire();
            }
        }
    }
}

/// Time from `now` until the next wall-clock occurrence of `time_of_day`.
/// An exact match counts as a full day away.
pub fn until_next(now: DateTime<Local>, time_of_day: NaiveTime) -> Duration {
    let now = now.naive_local();
    let mut target = now.date().and_time(time_of_day);
    if target <= now {
        target += TimeDelta::days(1);
    }
    (target - now).to_std().unwrap_or(DAY)
}
