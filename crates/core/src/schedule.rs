//! One-shot timers shared by the autosave engine and the search index.
//!
//! Components never sleep themselves. They hand a task and a delay to a
//! [`Scheduler`], keep the returned [`TimerToken`], and cancel it when the input
//! that armed it is superseded or when they are torn down.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{runtime::Handle, task::AbortHandle};
use tracing::trace;

/// Work executed when a timer fires.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle identifying a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Errors raised while setting up a scheduler.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// No tokio runtime is driving the current thread.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Source of one-shot timers.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay` unless cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> TimerToken;
    /// Cancel a pending timer. Cancelling a fired or unknown token is a no-op.
    fn cancel(&self, token: TimerToken);
}

/// Timers backed by sleeping tokio tasks.
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<u64, AbortHandle>>>,
}

impl TokioScheduler {
    /// Use the runtime driving the current thread.
    pub fn current() -> Result<Self, ScheduleError> {
        Ok(Self::from_handle(Handle::try_current()?))
    }

    /// Use an explicit runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        let mut timers = self.timers.lock();
        timers.retain(|_, handle| !handle.is_finished());
        timers.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            timers.lock().remove(&id);
            task();
        });

        let mut timers = self.timers.lock();
        timers.retain(|_, handle| !handle.is_finished());
        if !join.is_finished() {
            timers.insert(id, join.abort_handle());
        }
        trace!(timer = id, ?delay, "scheduled timer");
        TimerToken(id)
    }

    fn cancel(&self, token: TimerToken) {
        if let Some(handle) = self.timers.lock().remove(&token.0) {
            handle.abort();
            trace!(timer = token.0, "cancelled timer");
        }
    }
}

struct PendingTimer {
    due: Duration,
    id: u64,
    task: Task,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

/// Timers driven by an explicit virtual clock.
///
/// Nothing fires until [`ManualScheduler::advance`] moves the clock past a
/// deadline. Due timers run in deadline order, ties in scheduling order.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    /// Create a scheduler whose clock starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.clock.lock().pending.len()
    }

    /// Move the clock forward, running every timer that falls due on the way.
    ///
    /// Tasks run without the clock locked, so they may schedule further timers;
    /// those fire within this call too if their deadline is not past the target.
    /// A task may itself call `advance`; the clock never moves backwards.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.lock().now + by;
        loop {
            let next = {
                let mut clock = self.clock.lock();
                let position = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due <= target)
                    .min_by_key(|(_, timer)| (timer.due, timer.id))
                    .map(|(position, _)| position);
                match position {
                    Some(position) => {
                        let timer = clock.pending.swap_remove(position);
                        clock.now = clock.now.max(timer.due);
                        Some(timer)
                    }
                    None => {
                        clock.now = clock.now.max(target);
                        None
                    }
                }
            };
            match next {
                Some(timer) => (timer.task)(),
                None => break,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerToken {
        let mut clock = self.clock.lock();
        clock.next_id += 1;
        let id = clock.next_id;
        let due = clock.now + delay;
        clock.pending.push(PendingTimer { due, id, task });
        TimerToken(id)
    }

    fn cancel(&self, token: TimerToken) {
        self.clock.lock().pending.retain(|timer| timer.id != token.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn manual_timers_fire_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, delay) in [("late", 300), ("early", 100), ("tie", 100)] {
            let order = Arc::clone(&order);
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || order.lock().push(label)),
            );
        }

        scheduler.advance(Duration::from_millis(99));
        assert!(order.lock().is_empty());
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(*order.lock(), vec!["early", "tie"]);
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*order.lock(), vec!["early", "tie", "late"]);
        assert_eq!(scheduler.now(), Duration::from_millis(1100));
    }

    #[test]
    fn manual_cancel_prevents_firing() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let token = scheduler.schedule(Duration::from_millis(10), counter_task(&counter));
        scheduler.cancel(token);
        scheduler.cancel(token);
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn manual_tasks_can_reschedule() {
        let scheduler = Arc::new(ManualScheduler::new());
        let counter = Arc::new(AtomicUsize::new(0));

        fn arm(scheduler: &Arc<ManualScheduler>, counter: &Arc<AtomicUsize>) {
            let weak = Arc::downgrade(scheduler);
            let counter = Arc::clone(counter);
            scheduler.schedule(
                Duration::from_millis(100),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if let Some(scheduler) = weak.upgrade() {
                        arm(&scheduler, &counter);
                    }
                }),
            );
        }

        arm(&scheduler, &counter);
        scheduler.advance(Duration::from_millis(350));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timers_fire_and_cancel() -> Result<(), ScheduleError> {
        let scheduler = TokioScheduler::current()?;
        let fired = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(Duration::from_millis(50), counter_task(&fired));
        let token = scheduler.schedule(Duration::from_millis(50), counter_task(&cancelled));
        scheduler.cancel(token);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
        Ok(())
    }
}
