use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::state::{Snapshot, State};

/// Resizable counting semaphore for tokio tasks.
///
/// Same counters and admission rules as [`crate::Limiter`], but parked acquirers wait on a
/// [`tokio::sync::Notify`] instead of blocking their thread. The state lock is never held
/// across an `.await`.
///
/// Dropping an `acquire` future while it is parked (task abort, `select!`,
/// `tokio::time::timeout`) is safe: it leaves the wait set and hands on any wake it was
/// given.
///
/// # Example
///
/// ```rust
/// use limiter::AsyncLimiter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = AsyncLimiter::new(1);
/// let permit = limiter.permit().await;
/// assert!(limiter.try_permit().is_none());
/// drop(permit);
/// assert!(limiter.try_permit().is_some());
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncLimiter {
    state: Mutex<State>,
    waiters: tokio::sync::Notify,
}

// Undoes the `park` of an acquire future that is dropped before admission.
struct Parked<'a> {
    limiter: &'a AsyncLimiter,
    admitted: bool,
}

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        if self.admitted {
            return;
        }
        let wakes = {
            let mut state = self.limiter.state.lock();
            let wakes = state.unpark();
            trace!("acquire dropped while parked: {}", state.snapshot());
            wakes
        };
        self.limiter.wake(wakes);
    }
}

impl AsyncLimiter {
    /// # Panics
    ///
    /// Panics if `capacity` is less than 1.
    #[must_use]
    pub fn new(capacity: i32) -> Self {
        Self {
            state: Mutex::new(State::new(capacity)),
            waiters: tokio::sync::Notify::new(),
        }
    }

    /// Wait until a permit is available and take it.
    ///
    /// Cancel safe: if the future is dropped before it completes, no permit is held.
    pub async fn acquire(&self) {
        {
            let mut state = self.state.lock();
            if state.try_admit() {
                return;
            }
            state.park();
            trace!("parked: {}", state.snapshot());
        }
        let mut parked = Parked {
            limiter: self,
            admitted: false,
        };
        loop {
            let notified = self.waiters.notified();
            tokio::pin!(notified);
            // register before checking so a wake issued in between is not missed
            notified.as_mut().enable();
            {
                let mut state = self.state.lock();
                if state.can_admit() {
                    state.admit_parked();
                    parked.admitted = true;
                    trace!("admitted after parking: {}", state.snapshot());
                    return;
                }
            }
            notified.await;
        }
    }

    #[must_use = "a successful try_acquire must be paired with release"]
    pub fn try_acquire(&self) -> bool {
        self.state.lock().try_admit()
    }

    /// # Errors
    ///
    /// Returns [`Error::Canceled`] if no permit became available within `timeout`; nothing
    /// is held in that case.
    pub async fn acquire_timeout(&self, timeout: std::time::Duration) -> Result<()> {
        let start = tokio::time::Instant::now();
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| Error::Canceled {
                waited: start.elapsed(),
            })
    }

    /// Return a permit, waking one parked acquirer if any.
    pub fn release(&self) {
        let wakes = self.state.lock().release();
        self.wake(wakes);
    }

    /// Change the capacity. Values below 1 are ignored and `false` is returned.
    ///
    /// See [`crate::Limiter::resize`].
    pub fn resize(&self, capacity: i32) -> bool {
        let wakes = {
            let mut state = self.state.lock();
            let previous = state.capacity();
            match state.resize(capacity) {
                None => {
                    debug!("ignoring resize to {capacity}, capacity stays at {previous}");
                    return false;
                }
                Some(wakes) => {
                    debug!("resized {previous} -> {capacity}, waking {wakes}: {}", state.snapshot());
                    wakes
                }
            }
        };
        self.wake(wakes);
        true
    }

    #[must_use]
    pub fn capacity(&self) -> i32 {
        self.state.lock().capacity()
    }

    #[must_use]
    pub fn running(&self) -> i32 {
        self.state.lock().running()
    }

    #[must_use]
    pub fn blocked(&self) -> i32 {
        self.state.lock().blocked()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot()
    }

    pub async fn permit(&self) -> AsyncPermit<'_> {
        self.acquire().await;
        AsyncPermit { limiter: self }
    }

    #[must_use]
    pub fn try_permit(&self) -> Option<AsyncPermit<'_>> {
        self.try_acquire().then(|| AsyncPermit { limiter: self })
    }

    /// # Errors
    ///
    /// Returns [`Error::Canceled`] if no permit became available within `timeout`.
    pub async fn permit_timeout(&self, timeout: std::time::Duration) -> Result<AsyncPermit<'_>> {
        self.acquire_timeout(timeout).await?;
        Ok(AsyncPermit { limiter: self })
    }

    fn wake(&self, count: usize) {
        for _ in 0..count {
            self.waiters.notify_one();
        }
    }
}

/// RAII guard holding one permit of an [`AsyncLimiter`].
#[derive(Debug)]
pub struct AsyncPermit<'a> {
    limiter: &'a AsyncLimiter,
}

impl AsyncPermit<'_> {
    /// Drop the guard without releasing; the caller now owes an [`AsyncLimiter::release`].
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for AsyncPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
