use std::fmt;
use std::time::Duration;

use crate::ResourceId;

/// Identifies a callback scheduled through a [`Scheduler`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimerId(u64);

impl TimerId {
    /// Creates a timer ID from a value chosen by the scheduler implementation.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The value the scheduler implementation chose for this timer.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The work a [`Scheduler`] runs once a delay has elapsed.
///
/// Pools create these for their delayed releases. Scheduler implementations store the callback
/// and call [`run()`][Self::run] when it is due.
pub struct TimerCallback(Box<dyn FnOnce()>);

impl TimerCallback {
    /// Wraps `callback` for handing it to a [`Scheduler`].
    #[must_use]
    pub fn new(callback: impl FnOnce() + 'static) -> Self {
        Self(Box::new(callback))
    }

    /// Runs the callback, consuming it.
    pub fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for TimerCallback {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerCallback").finish_non_exhaustive()
    }
}

/// Runs callbacks after a delay. Used by pools for delayed release.
///
/// Callbacks must run on the same thread that drives the pool and must not run from within
/// [`schedule_after()`][Self::schedule_after] itself. Cancellation may be best-effort. The pool
/// ignores callbacks it no longer expects.
///
/// [`TickScheduler`][crate::TickScheduler] is a ready-made implementation driven by the caller's
/// tick loop.
#[cfg_attr(test, mockall::automock)]
pub trait Scheduler {
    /// Schedules `callback` to run once `delay` has elapsed. `owner` is the resource the
    /// callback will release.
    fn schedule_after(
        &self,
        owner: ResourceId,
        delay: Duration,
        callback: TimerCallback,
    ) -> TimerId;

    /// Cancels a scheduled callback on a best-effort basis. Cancelling a timer that already
    /// fired or was already cancelled does nothing.
    fn cancel(&self, timer: TimerId);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn callback_runs_when_run() {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = Rc::clone(&runs);

        let callback = TimerCallback::new(move || runs_clone.set(runs_clone.get() + 1));
        assert_eq!(runs.get(), 0);

        callback.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn mock_scheduler_accepts_callbacks() {
        let mut scheduler = MockScheduler::new();
        scheduler
            .expect_schedule_after()
            .times(1)
            .returning(|_, _, callback| {
                callback.run();
                TimerId::new(3)
            });

        let runs = Rc::new(Cell::new(0));
        let runs_clone = Rc::clone(&runs);

        let owner = ResourceId::new(crate::lease::PoolId::next(), 0, 0);
        let timer = scheduler.schedule_after(
            owner,
            Duration::from_millis(5),
            TimerCallback::new(move || runs_clone.set(runs_clone.get() + 1)),
        );

        assert_eq!(timer, TimerId::new(3));
        assert_eq!(runs.get(), 1);
    }
}
