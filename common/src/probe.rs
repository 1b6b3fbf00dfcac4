use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{Level, event, instrument};

/// Tracks how many workers are between "got a permit" and "about to release it".
///
/// Workers call [`ConcurrencyProbe::guard`] right after acquiring; the guard counts them as
/// a holder until dropped. Every entry samples the number of holders at that moment, which
/// feeds the peak and the concurrency histogram.
#[derive(Debug)]
pub struct ConcurrencyProbe {
    current: AtomicI64,
    peak: AtomicI64,
    entered: AtomicU64,
    // histogram[n] = number of entries that observed n holders (including themselves)
    histogram: parking_lot::Mutex<Vec<u64>>,
}

impl Default for ConcurrencyProbe {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProbeGuard<'a> {
    probe: &'a ConcurrencyProbe,
}

impl<'a> ProbeGuard<'a> {
    pub fn new(probe: &'a ConcurrencyProbe) -> Self {
        probe.enter();
        Self { probe }
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStatus {
    pub current: i64,
    pub peak: i64,
    pub entered: u64,
    pub histogram: Vec<u64>,
}

impl ProbeStatus {
    /// Highest concurrency level with at least one sample
    #[must_use]
    pub fn max_sampled(&self) -> usize {
        self.histogram
            .iter()
            .rposition(|&count| count > 0)
            .unwrap_or(0)
    }
}

impl ConcurrencyProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: AtomicI64::new(0),
            peak: AtomicI64::new(0),
            entered: AtomicU64::new(0),
            histogram: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn guard(&self) -> ProbeGuard<'_> {
        ProbeGuard::new(self)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.entered.fetch_add(1, Ordering::SeqCst);
        let level = usize::try_from(now).unwrap_or(0);
        let mut histogram = self.histogram.lock();
        if histogram.len() <= level {
            histogram.resize(level + 1, 0);
        }
        histogram[level] += 1;
    }

    #[instrument]
    pub fn get(&self) -> ProbeStatus {
        let status = ProbeStatus {
            current: self.current.load(Ordering::SeqCst),
            peak: self.peak.load(Ordering::SeqCst),
            entered: self.entered.load(Ordering::SeqCst),
            histogram: self.histogram.lock().clone(),
        };
        if status.current < 0 {
            event!(
                Level::DEBUG,
                "Probe inversion - current: {}, peak {}",
                status.current,
                status.peak
            );
        }
        status
    }
}
