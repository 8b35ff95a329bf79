use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use foldhash::{HashMap, HashMapExt};
use tracing::trace;

use crate::{ResourceId, Scheduler, TimerCallback, TimerId};

/// A [`Scheduler`] driven by the caller's tick loop.
///
/// The scheduler keeps its own virtual clock that only moves when [`advance()`][Self::advance] is
/// called, typically once per tick with the time elapsed since the previous tick. Due callbacks
/// run inside `advance()`, on the calling thread, in deadline order. Callbacks with the same
/// deadline run in the order they were scheduled.
///
/// A callback that schedules another callback never causes that one to run during the same
/// `advance()` call, even with a zero delay.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// use keyed_pool::{Scheduler, TickScheduler, TimerCallback};
/// # use keyed_pool::{KeyedPool, Lifecycle, PoolConfig, Poolable};
/// # #[derive(Clone, Default)]
/// # struct Dummy(Option<u8>);
/// # impl Poolable for Dummy {
/// #     type Key = u8;
/// #     fn key(&self) -> Option<&u8> { self.0.as_ref() }
/// #     fn set_key(&mut self, key: u8) { self.0 = Some(key); }
/// #     fn activate(&mut self, _: &mut Lifecycle<'_, u8>) {}
/// #     fn deactivate(&mut self) {}
/// # }
/// # let pool = KeyedPool::builder()
/// #     .key(0, PoolConfig::from_prototype(Dummy::default()).max_size(1))
/// #     .build()
/// #     .unwrap();
/// # let owner = pool.acquire(&0).unwrap().id();
///
/// let scheduler = TickScheduler::new();
///
/// let fired = Rc::new(Cell::new(false));
/// let fired_clone = Rc::clone(&fired);
/// scheduler.schedule_after(
///     owner,
///     Duration::from_millis(100),
///     TimerCallback::new(move || fired_clone.set(true)),
/// );
///
/// scheduler.advance(Duration::from_millis(60));
/// assert!(!fired.get());
///
/// scheduler.advance(Duration::from_millis(60));
/// assert!(fired.get());
/// ```
pub struct TickScheduler {
    state: RefCell<State>,
}

struct State {
    now: Duration,
    next_timer: u64,

    // Ordered by deadline, then by timer ID, which increases in scheduling order.
    timers: BTreeMap<(Duration, u64), TimerCallback>,

    // Deadline of every scheduled timer, for cancellation.
    deadlines: HashMap<TimerId, Duration>,
}

impl TickScheduler {
    /// Creates a scheduler whose clock starts at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                now: Duration::ZERO,
                next_timer: 0,
                timers: BTreeMap::new(),
                deadlines: HashMap::new(),
            }),
        }
    }

    /// Time elapsed on the virtual clock.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// The number of callbacks that are scheduled and not cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Moves the clock forward by `elapsed` and runs every callback that became due.
    ///
    /// Returns the number of callbacks that ran.
    ///
    /// # Panics
    ///
    /// Panics if called from within one of the scheduler's own callbacks.
    pub fn advance(&self, elapsed: Duration) -> usize {
        let (target, first_unseen_timer) = {
            let state = self.state.borrow();
            (state.now.saturating_add(elapsed), state.next_timer)
        };

        let mut fired: usize = 0;

        loop {
            let (raw_timer, callback) = {
                let mut state = self.state.borrow_mut();

                // Timers scheduled by callbacks of this call wait for the next one.
                let due = state
                    .timers
                    .range(..=(target, u64::MAX))
                    .map(|(entry, _)| *entry)
                    .find(|(_, raw_timer)| *raw_timer < first_unseen_timer);

                let Some((deadline, raw_timer)) = due else {
                    break;
                };

                state.now = state.now.max(deadline);
                state.deadlines.remove(&TimerId::new(raw_timer));

                let callback = state
                    .timers
                    .remove(&(deadline, raw_timer))
                    .expect("entry was found in the map under this key just above");

                (raw_timer, callback)
            };

            // The state is not borrowed here, so the callback may schedule or cancel timers.
            trace!(timer = raw_timer, "timer fired");
            callback.run();
            fired = fired.saturating_add(1);
        }

        self.state.borrow_mut().now = target;

        fired
    }
}

impl Scheduler for TickScheduler {
    fn schedule_after(
        &self,
        owner: ResourceId,
        delay: Duration,
        callback: TimerCallback,
    ) -> TimerId {
        let mut state = self.state.borrow_mut();

        let timer = TimerId::new(state.next_timer);
        state.next_timer = state.next_timer.wrapping_add(1);

        let deadline = state.now.saturating_add(delay);
        state.timers.insert((deadline, timer.raw()), callback);
        state.deadlines.insert(timer, deadline);

        trace!(?owner, ?delay, timer = timer.raw(), "timer scheduled");

        timer
    }

    fn cancel(&self, timer: TimerId) {
        let mut state = self.state.borrow_mut();

        if let Some(deadline) = state.deadlines.remove(&timer) {
            state.timers.remove(&(deadline, timer.raw()));
            trace!(timer = timer.raw(), "timer cancelled");
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TickScheduler {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();

        f.debug_struct("TickScheduler")
            .field("now", &state.now)
            .field("pending", &state.timers.len())
            .finish()
    }
}
