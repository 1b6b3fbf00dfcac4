//! Named limiters shared across a process.
//!
//! Worker pools register the limiter they gate on under a well-known name, and control-plane
//! code (an admin endpoint, a config reload) looks it up by that name to resize it or to
//! export its counters.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::limiter::Limiter;
use crate::state::Snapshot;

static GLOBAL: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

#[derive(Debug, Default)]
pub struct Registry {
    limiters: RwLock<BTreeMap<String, Arc<Limiter>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the limiter registered under `name`, creating it with `capacity` if missing.
    ///
    /// An existing limiter keeps its current capacity.
    ///
    /// # Panics
    ///
    /// Panics if the limiter has to be created and `capacity` is less than 1.
    pub fn register(&self, name: &str, capacity: i32) -> Arc<Limiter> {
        if let Some(limiter) = self.get(name) {
            return limiter;
        }
        let mut limiters = self.limiters.write();
        limiters
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("registering limiter {name:?} with capacity {capacity}");
                Arc::new(Limiter::new(capacity))
            })
            .clone()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Limiter>> {
        self.limiters.read().get(name).cloned()
    }

    /// Resize the limiter registered under `name`; see [`Limiter::resize`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLimiter`] if nothing is registered under `name`.
    pub fn resize(&self, name: &str, capacity: i32) -> Result<bool> {
        let limiter = self.get(name).ok_or_else(|| Error::UnknownLimiter {
            name: name.to_string(),
        })?;
        Ok(limiter.resize(capacity))
    }

    /// Counters of every registered limiter, ordered by name.
    #[must_use]
    pub fn snapshots(&self) -> Vec<(String, Snapshot)> {
        self.limiters
            .read()
            .iter()
            .map(|(name, limiter)| (name.clone(), limiter.snapshot()))
            .collect()
    }
}

/// [`Registry::register`] on the process-wide registry.
pub fn register(name: &str, capacity: i32) -> Arc<Limiter> {
    GLOBAL.register(name, capacity)
}

#[must_use]
pub fn get(name: &str) -> Option<Arc<Limiter>> {
    GLOBAL.get(name)
}

/// [`Registry::resize`] on the process-wide registry.
///
/// # Errors
///
/// Returns [`Error::UnknownLimiter`] if nothing is registered under `name`.
pub fn resize(name: &str, capacity: i32) -> Result<bool> {
    GLOBAL.resize(name, capacity)
}

#[must_use]
pub fn snapshots() -> Vec<(String, Snapshot)> {
    GLOBAL.snapshots()
}
