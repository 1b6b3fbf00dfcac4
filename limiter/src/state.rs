//! Counter state shared by the blocking and async limiters.
//!
//! [`State`] holds the three counters of a limiter and implements every transition on them.
//! It knows nothing about parking: each transition reports how many parked acquirers the
//! caller has to wake, and the front end ([`crate::Limiter`] or [`crate::AsyncLimiter`])
//! performs the wakes with its own primitive.

use serde::{Deserialize, Serialize};

/// Point-in-time view of a limiter's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Maximum number of permits that may be held at once
    pub capacity: i32,
    /// Permits currently held
    pub running: i32,
    /// Acquirers parked waiting for a permit
    pub blocked: i32,
}

impl Snapshot {
    /// No permit is held and nobody is waiting.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.running == 0 && self.blocked == 0
    }

    /// Permits that can be handed out right now without waiting.
    ///
    /// Zero while a shrink is still draining (`running > capacity`).
    #[must_use]
    pub fn available(&self) -> i32 {
        (self.capacity - self.running).max(0)
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "capacity: {}, running: {}, blocked: {}",
            self.capacity, self.running, self.blocked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct State {
    capacity: i32,
    running: i32,
    blocked: i32,
}

impl State {
    pub(crate) fn new(capacity: i32) -> Self {
        assert!(
            capacity > 0,
            "limiter capacity must be at least 1, got {capacity}"
        );
        Self {
            capacity,
            running: 0,
            blocked: 0,
        }
    }

    pub(crate) fn capacity(&self) -> i32 {
        self.capacity
    }

    pub(crate) fn running(&self) -> i32 {
        self.running
    }

    pub(crate) fn blocked(&self) -> i32 {
        self.blocked
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            capacity: self.capacity,
            running: self.running,
            blocked: self.blocked,
        }
    }

    /// The admission predicate.
    pub(crate) fn can_admit(&self) -> bool {
        self.running < self.capacity
    }

    /// Admit a newly arriving acquirer if a permit is free.
    pub(crate) fn try_admit(&mut self) -> bool {
        if !self.can_admit() {
            return false;
        }
        self.running += 1;
        true
    }

    /// Register an acquirer that found no free permit on entry.
    pub(crate) fn park(&mut self) {
        self.blocked += 1;
    }

    /// Admit a parked acquirer; the caller must have checked [`State::can_admit`].
    pub(crate) fn admit_parked(&mut self) {
        debug_assert!(self.can_admit());
        debug_assert!(self.blocked > 0);
        self.blocked -= 1;
        self.running += 1;
    }

    /// Remove a parked acquirer that gave up waiting.
    ///
    /// Returns the number of waiters to wake so that a wake the leaving acquirer may have
    /// absorbed is handed on.
    pub(crate) fn unpark(&mut self) -> usize {
        debug_assert!(self.blocked > 0);
        self.blocked = (self.blocked - 1).max(0);
        usize::from(self.can_admit() && self.blocked > 0)
    }

    /// Return a permit. Returns the number of waiters to wake (zero or one).
    ///
    /// A release without a matching acquire panics in debug builds. Release builds clamp
    /// `running` at zero and log the misuse.
    pub(crate) fn release(&mut self) -> usize {
        debug_assert!(
            self.running > 0,
            "release called without a matching acquire"
        );
        if self.running <= 0 {
            tracing::error!(
                "release called without a matching acquire (capacity: {}, blocked: {}), ignoring",
                self.capacity,
                self.blocked
            );
            return 0;
        }
        self.running -= 1;
        usize::from(self.blocked > 0)
    }

    /// Change the capacity. Non-positive values are ignored and yield `None`.
    ///
    /// Otherwise returns the number of waiters to wake: `min(delta, blocked)` when growing,
    /// zero when shrinking. Held permits are never revoked; a shrink takes effect as they
    /// are released.
    pub(crate) fn resize(&mut self, capacity: i32) -> Option<usize> {
        if capacity <= 0 {
            return None;
        }
        let delta = capacity - self.capacity;
        self.capacity = capacity;
        if delta > 0 && self.blocked > 0 {
            Some(delta.min(self.blocked) as usize)
        } else {
            Some(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn admits_up_to_capacity() {
        let mut state = State::new(2);
        assert!(state.try_admit());
        assert!(state.try_admit());
        assert!(!state.try_admit());
        assert_eq!(state.running(), 2);
        assert_eq!(state.blocked(), 0);
    }

    #[test]
    #[should_panic(expected = "limiter capacity must be at least 1")]
    fn zero_capacity_panics() {
        let _ = State::new(0);
    }

    #[test]
    fn release_wakes_only_when_someone_waits() {
        let mut state = State::new(1);
        assert!(state.try_admit());
        assert_eq!(state.release(), 0);
        assert!(state.try_admit());
        state.park();
        assert_eq!(state.release(), 1);
        state.admit_parked();
        assert_eq!(state.snapshot().running, 1);
        assert_eq!(state.snapshot().blocked, 0);
    }

    #[test]
    fn resize_up_wakes_at_most_delta() {
        let mut state = State::new(1);
        assert!(state.try_admit());
        for _ in 0..5 {
            state.park();
        }
        assert_eq!(state.resize(3), Some(2));
        assert_eq!(state.resize(100), Some(5));
        // blocked is only updated by the acquirers themselves
        assert_eq!(state.blocked(), 5);
    }

    #[test]
    fn resize_down_keeps_holders() {
        let mut state = State::new(10);
        for _ in 0..10 {
            assert!(state.try_admit());
        }
        assert_eq!(state.resize(3), Some(0));
        assert_eq!(state.running(), 10);
        assert!(!state.can_admit());
        assert_eq!(state.snapshot().available(), 0);
        for _ in 0..7 {
            state.release();
        }
        assert!(!state.can_admit());
        state.release();
        assert!(state.can_admit());
    }

    #[test]
    fn non_positive_resize_is_ignored() {
        let mut state = State::new(4);
        state.park();
        assert_eq!(state.resize(0), None);
        assert_eq!(state.resize(-5), None);
        assert_eq!(state.capacity(), 4);
    }

    #[test]
    fn unpark_forwards_wake_when_permit_free() {
        let mut state = State::new(1);
        assert!(state.try_admit());
        state.park();
        state.park();
        // still full - nothing to forward
        assert_eq!(state.unpark(), 0);
        state.park();
        assert_eq!(state.release(), 1);
        // the woken waiter leaves instead of taking the permit
        assert_eq!(state.unpark(), 1);
        assert_eq!(state.blocked(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "release called without a matching acquire")]
    fn unmatched_release_panics_in_debug() {
        let mut state = State::new(1);
        state.release();
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn unmatched_release_clamps_in_release() {
        let mut state = State::new(1);
        assert_eq!(state.release(), 0);
        assert_eq!(state.running(), 0);
    }

    #[test]
    fn snapshot_serializes() {
        let mut state = State::new(3);
        state.try_admit();
        let json = serde_json::to_string(&state.snapshot()).unwrap();
        assert_eq!(json, r#"{"capacity":3,"running":1,"blocked":0}"#);
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state.snapshot());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enter,
        Wake,
        Release,
        Cancel,
        Resize(i32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => Just(Op::Enter),
            3 => Just(Op::Wake),
            4 => Just(Op::Release),
            1 => Just(Op::Cancel),
            2 => (-2..12i32).prop_map(Op::Resize),
        ]
    }

    proptest! {
        // Drives the state machine the way the front ends do, with parked acquirers modeled
        // as a plain count and wakes delivered in arbitrary order.
        #[test]
        fn counters_stay_consistent(initial in 1..8i32, ops in proptest::collection::vec(op(), 1..200)) {
            let mut state = State::new(initial);
            let mut holders = 0i32;
            let mut parked = 0i32;
            let mut pending_wakes = 0usize;
            for op in ops {
                match op {
                    Op::Enter => {
                        let before = state;
                        if state.try_admit() {
                            prop_assert!(before.running < before.capacity);
                            holders += 1;
                        } else {
                            prop_assert!(before.running >= before.capacity);
                            state.park();
                            parked += 1;
                        }
                    }
                    Op::Wake => {
                        if parked > 0 && pending_wakes > 0 {
                            pending_wakes -= 1;
                            if state.can_admit() {
                                state.admit_parked();
                                parked -= 1;
                                holders += 1;
                            }
                        }
                    }
                    Op::Release => {
                        if holders > 0 {
                            let wakes = state.release();
                            prop_assert!(wakes <= 1);
                            prop_assert_eq!(wakes == 1, parked > 0);
                            pending_wakes += wakes;
                            holders -= 1;
                        }
                    }
                    Op::Cancel => {
                        if parked > 0 {
                            pending_wakes += state.unpark();
                            parked -= 1;
                        }
                    }
                    Op::Resize(n) => {
                        let before = state;
                        match state.resize(n) {
                            None => {
                                prop_assert!(n <= 0);
                                prop_assert_eq!(state, before);
                            }
                            Some(wakes) => {
                                prop_assert_eq!(state.capacity(), n);
                                prop_assert!(wakes as i32 <= before.blocked);
                                prop_assert!(wakes as i32 <= (n - before.capacity).max(0));
                                pending_wakes += wakes;
                            }
                        }
                    }
                }
                prop_assert_eq!(state.running(), holders);
                prop_assert_eq!(state.blocked(), parked);
                prop_assert!(state.running() >= 0);
                prop_assert!(state.blocked() >= 0);
            }
        }
    }
}
