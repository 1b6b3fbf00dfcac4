use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::state::{Snapshot, State};

/// Resizable counting semaphore for native threads.
///
/// All counters are guarded by one mutex; parked acquirers wait on a condition variable and
/// re-check admission in a loop every time they wake, so stolen permits and extra wakes are
/// harmless. Wake order is not strictly FIFO: an arriving acquirer may barge ahead of one
/// that has been parked longer.
///
/// # Example
///
/// ```rust
/// use limiter::Limiter;
///
/// let limiter = Limiter::new(2);
/// {
///     let _a = limiter.permit();
///     let _b = limiter.permit();
///     assert!(limiter.try_permit().is_none());
///     limiter.resize(3);
///     assert!(limiter.try_permit().is_some());
/// }
/// assert_eq!(limiter.running(), 0);
/// ```
#[derive(Debug)]
pub struct Limiter {
    state: Mutex<State>,
    waiters: Condvar,
}

impl Limiter {
    /// Create a limiter admitting up to `capacity` concurrent holders.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is less than 1.
    #[must_use]
    pub fn new(capacity: i32) -> Self {
        Self {
            state: Mutex::new(State::new(capacity)),
            waiters: Condvar::new(),
        }
    }

    /// Block until a permit is available and take it.
    ///
    /// Every successful `acquire` must be paired with exactly one [`Limiter::release`].
    pub fn acquire(&self) {
        let mut state = self.state.lock();
        if state.try_admit() {
            return;
        }
        state.park();
        trace!("parked: {}", state.snapshot());
        while !state.can_admit() {
            self.waiters.wait(&mut state);
        }
        state.admit_parked();
        trace!("admitted after parking: {}", state.snapshot());
    }

    /// Take a permit only if one is free right now.
    #[must_use = "a successful try_acquire must be paired with release"]
    pub fn try_acquire(&self) -> bool {
        self.state.lock().try_admit()
    }

    /// Like [`Limiter::acquire`] but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canceled`] if no permit became available in time; nothing is held
    /// in that case.
    pub fn acquire_timeout(&self, timeout: std::time::Duration) -> Result<()> {
        self.acquire_deadline(std::time::Instant::now() + timeout)
    }

    /// Like [`Limiter::acquire`] but gives up once `deadline` has passed.
    ///
    /// A permit that is free when the deadline fires is still taken.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canceled`] if no permit became available in time; nothing is held
    /// in that case.
    pub fn acquire_deadline(&self, deadline: std::time::Instant) -> Result<()> {
        let start = std::time::Instant::now();
        let mut state = self.state.lock();
        if state.try_admit() {
            return Ok(());
        }
        state.park();
        while !state.can_admit() {
            if self.waiters.wait_until(&mut state, deadline).timed_out() && !state.can_admit() {
                // no permit is free, so no other waiter could use a wake handed on from here
                let wakes = state.unpark();
                debug_assert_eq!(wakes, 0);
                trace!("gave up waiting: {}", state.snapshot());
                return Err(Error::Canceled {
                    waited: start.elapsed(),
                });
            }
        }
        state.admit_parked();
        Ok(())
    }

    /// Return a permit taken by a matching acquire, waking one parked acquirer if any.
    ///
    /// A release without a matching acquire panics in debug builds; release builds log an
    /// error and leave the counters untouched.
    pub fn release(&self) {
        let mut state = self.state.lock();
        let wakes = state.release();
        self.wake(wakes);
    }

    /// Change the capacity. Values below 1 are ignored and `false` is returned.
    ///
    /// Growing wakes up to `min(delta, blocked)` parked acquirers. Shrinking revokes
    /// nothing: current holders keep their permits and no one new is admitted until
    /// `running` drops below the new capacity.
    pub fn resize(&self, capacity: i32) -> bool {
        let mut state = self.state.lock();
        let previous = state.capacity();
        match state.resize(capacity) {
            None => {
                debug!("ignoring resize to {capacity}, capacity stays at {previous}");
                false
            }
            Some(wakes) => {
                debug!("resized {previous} -> {capacity}, waking {wakes}: {}", state.snapshot());
                self.wake(wakes);
                true
            }
        }
    }

    #[must_use]
    pub fn capacity(&self) -> i32 {
        self.state.lock().capacity()
    }

    /// Permits currently held.
    #[must_use]
    pub fn running(&self) -> i32 {
        self.state.lock().running()
    }

    /// Acquirers currently parked.
    #[must_use]
    pub fn blocked(&self) -> i32 {
        self.state.lock().blocked()
    }

    /// All three counters, read under one lock.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot()
    }

    /// Acquire and wrap the permit in a guard that releases it on drop.
    pub fn permit(&self) -> Permit<'_> {
        self.acquire();
        Permit { limiter: self }
    }

    #[must_use]
    pub fn try_permit(&self) -> Option<Permit<'_>> {
        self.try_acquire().then(|| Permit { limiter: self })
    }

    /// # Errors
    ///
    /// Returns [`Error::Canceled`] if no permit became available within `timeout`.
    pub fn permit_timeout(&self, timeout: std::time::Duration) -> Result<Permit<'_>> {
        self.acquire_timeout(timeout)?;
        Ok(Permit { limiter: self })
    }

    // condvar notifications are issued with the state lock held
    fn wake(&self, count: usize) {
        for _ in 0..count {
            self.waiters.notify_one();
        }
    }
}

/// RAII guard holding one permit of a [`Limiter`].
#[derive(Debug)]
pub struct Permit<'a> {
    limiter: &'a Limiter,
}

impl Permit<'_> {
    /// Drop the guard without releasing; the caller now owes a [`Limiter::release`].
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
