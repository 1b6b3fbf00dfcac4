//! Resizable fair-concurrency limiting
//!
//! This crate provides a counting semaphore whose capacity can be changed while acquirers are
//! parked on it. It bounds how many callers may be inside a region at once - open extents,
//! in-flight repair jobs, concurrent flash reads - and lets a control plane tighten or relax
//! that bound at runtime without restarting the workers gated by it.
//!
//! # Overview
//!
//! A limiter tracks three counters:
//!
//! 1. **capacity** - maximum number of permits that may be held at once
//! 2. **running** - permits currently held
//! 3. **blocked** - acquirers parked waiting for a permit
//!
//! Two front ends share the same admission rules:
//!
//! - [`Limiter`] parks native threads on a condition variable
//! - [`AsyncLimiter`] parks tokio tasks on a [`tokio::sync::Notify`]
//!
//! # Usage Patterns
//!
//! ## Worker pool
//!
//! ```rust
//! use limiter::Limiter;
//! use std::sync::Arc;
//!
//! let limiter = Arc::new(Limiter::new(4));
//! std::thread::scope(|scope| {
//!     for _ in 0..16 {
//!         let limiter = limiter.clone();
//!         scope.spawn(move || {
//!             let _permit = limiter.permit();
//!             // at most 4 threads are here at any time
//!         });
//!     }
//! });
//! assert_eq!(limiter.running(), 0);
//! ```
//!
//! ## Resizing
//!
//! ```rust
//! use limiter::Limiter;
//!
//! let limiter = Limiter::new(8);
//! let held: Vec<_> = (0..8).map(|_| limiter.permit()).collect();
//! // shrinking never revokes permits that are already held
//! limiter.resize(2);
//! assert_eq!(limiter.running(), 8);
//! assert!(limiter.try_permit().is_none());
//! drop(held);
//! assert!(limiter.try_permit().is_some());
//! // non-positive sizes are ignored
//! assert!(!limiter.resize(0));
//! assert_eq!(limiter.capacity(), 2);
//! ```
//!
//! ## Named limiters
//!
//! ```rust
//! let flash_reads = limiter::registry::register("flash-read", 32);
//! let _permit = flash_reads.permit();
//! // elsewhere, e.g. from an admin handler
//! limiter::registry::resize("flash-read", 64).unwrap();
//! ```
//!
//! # Resize Semantics
//!
//! Growing by `delta` wakes up to `min(delta, blocked)` parked acquirers. Every woken acquirer
//! re-checks `running < capacity` under the lock and parks again if it lost the permit to a
//! barging newcomer, so extra wakes from concurrent releases are harmless.
//!
//! Shrinking takes effect lazily: holders keep their permits and nobody new is admitted until
//! releases bring `running` below the new capacity.
//!
//! # Misuse
//!
//! A [`Limiter::release`] without a matching acquire panics in debug builds. Release builds
//! log an error and leave the counters unchanged instead of letting `running` go negative.
//!
//! # Fairness
//!
//! Waiters are woken one at a time, but a newly arriving acquirer may take a freed permit
//! before the woken waiter gets to it. Liveness holds under steady work; strict FIFO order is
//! not provided.

mod async_limiter;
mod error;
mod limiter;
pub mod registry;
mod state;

pub use async_limiter::{AsyncLimiter, AsyncPermit};
pub use error::{Error, Result};
pub use limiter::{Limiter, Permit};
pub use registry::Registry;
pub use state::Snapshot;
