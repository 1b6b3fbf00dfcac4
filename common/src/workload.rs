use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{LimiterConfig, ResizeStep, WorkloadConfig};
use crate::probe::{ConcurrencyProbe, ProbeStatus};

#[derive(Debug, Default)]
struct ResizeCounts {
    applied: AtomicU64,
    ignored: AtomicU64,
}

impl ResizeCounts {
    fn record(&self, applied: bool) {
        if applied {
            self.applied.fetch_add(1, Ordering::SeqCst);
        } else {
            self.ignored.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Outcome of one workload run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub mode: String,
    pub elapsed_secs: f64,
    pub operations: u64,
    pub resizes_applied: u64,
    pub resizes_ignored: u64,
    pub concurrency: ProbeStatus,
    pub limiter: limiter::Snapshot,
}

impl Summary {
    fn new(
        mode: &str,
        elapsed: Duration,
        resizes: &ResizeCounts,
        concurrency: ProbeStatus,
        limiter: limiter::Snapshot,
    ) -> Self {
        Self {
            mode: mode.to_string(),
            elapsed_secs: elapsed.as_secs_f64(),
            operations: concurrency.entered,
            resizes_applied: resizes.applied.load(Ordering::SeqCst),
            resizes_ignored: resizes.ignored.load(Ordering::SeqCst),
            concurrency,
            limiter,
        }
    }

    /// Operations completed per second
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.operations as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "mode: {}", self.mode)?;
        writeln!(f, "elapsed: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "operations: {}", self.operations)?;
        writeln!(f, "throughput: {:.2} ops/s", self.throughput())?;
        writeln!(f, "resizes applied: {}", self.resizes_applied)?;
        writeln!(f, "resizes ignored: {}", self.resizes_ignored)?;
        writeln!(f, "peak concurrency: {}", self.concurrency.peak)?;
        writeln!(f, "final limiter: {}", self.limiter)?;
        writeln!(f, "concurrency histogram:")?;
        for (level, &count) in self.concurrency.histogram.iter().enumerate().skip(1) {
            writeln!(f, "  {level:>4}: {count}")?;
        }
        Ok(())
    }
}

fn ensure_quiescent(snapshot: limiter::Snapshot) -> Result<()> {
    if !snapshot.is_quiescent() {
        return Err(anyhow!("limiter not quiescent after run: {snapshot}"));
    }
    Ok(())
}

fn ensure_complete(summary: Summary, workload: &WorkloadConfig) -> Result<Summary> {
    if summary.operations != workload.operations() {
        return Err(anyhow!(
            "expected {} operations, workers completed {}",
            workload.operations(),
            summary.operations
        ));
    }
    Ok(summary)
}

fn apply_schedule_blocking(
    limiter: &limiter::Limiter,
    schedule: &[ResizeStep],
    start: Instant,
    finished: &AtomicBool,
    counts: &ResizeCounts,
) {
    for step in schedule {
        let target = start + step.at;
        loop {
            if finished.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= target {
                break;
            }
            std::thread::sleep(std::cmp::min(target - now, Duration::from_millis(5)));
        }
        debug!("applying resize step {:?}", step);
        counts.record(limiter.resize(step.capacity));
    }
}

/// Run the workload on native threads against a blocking [`limiter::Limiter`].
#[instrument(skip(limiter_config))]
pub fn run_threads(limiter_config: &LimiterConfig, workload: &WorkloadConfig) -> Result<Summary> {
    limiter_config.validate()?;
    workload.validate()?;
    info!(
        "running {} threads x {} iterations, capacity {}",
        workload.workers, workload.iterations, limiter_config.capacity
    );
    let limiter = limiter::Limiter::new(limiter_config.capacity);
    let probe = ConcurrencyProbe::new();
    let counts = ResizeCounts::default();
    let finished = AtomicBool::new(false);
    let schedule = limiter_config.schedule();
    let start = Instant::now();
    std::thread::scope(|scope| -> Result<()> {
        let limiter = &limiter;
        let probe = &probe;
        let resizer =
            scope.spawn(|| apply_schedule_blocking(limiter, &schedule, start, &finished, &counts));
        let workers: Vec<_> = (0..workload.workers)
            .map(|_| {
                scope.spawn(move || {
                    for _ in 0..workload.iterations {
                        let _permit = limiter.permit();
                        let _guard = probe.guard();
                        if !workload.work.is_zero() {
                            std::thread::sleep(workload.work);
                        }
                    }
                })
            })
            .collect();
        let failed = workers
            .into_iter()
            .map(std::thread::ScopedJoinHandle::join)
            .filter(std::result::Result::is_err)
            .count();
        finished.store(true, Ordering::SeqCst);
        resizer
            .join()
            .map_err(|_| anyhow!("resize schedule thread panicked"))?;
        if failed > 0 {
            return Err(anyhow!("{failed} worker thread(s) panicked"));
        }
        Ok(())
    })?;
    let elapsed = start.elapsed();
    let snapshot = limiter.snapshot();
    ensure_quiescent(snapshot)?;
    ensure_complete(
        Summary::new("threads", elapsed, &counts, probe.get(), snapshot),
        workload,
    )
}

/// Run the workload on tokio tasks against a [`limiter::AsyncLimiter`].
#[instrument(skip(limiter_config))]
pub async fn run_tasks(limiter_config: &LimiterConfig, workload: &WorkloadConfig) -> Result<Summary> {
    limiter_config.validate()?;
    workload.validate()?;
    info!(
        "running {} tasks x {} iterations, capacity {}",
        workload.workers, workload.iterations, limiter_config.capacity
    );
    let limiter = Arc::new(limiter::AsyncLimiter::new(limiter_config.capacity));
    let probe = Arc::new(ConcurrencyProbe::new());
    let counts = Arc::new(ResizeCounts::default());
    let start = tokio::time::Instant::now();
    let resizer = {
        let limiter = limiter.clone();
        let counts = counts.clone();
        let schedule = limiter_config.schedule();
        tokio::spawn(async move {
            for step in schedule {
                tokio::time::sleep_until(start + step.at).await;
                debug!("applying resize step {:?}", step);
                counts.record(limiter.resize(step.capacity));
            }
        })
    };
    let mut join_set = tokio::task::JoinSet::new();
    for _ in 0..workload.workers {
        let limiter = limiter.clone();
        let probe = probe.clone();
        let workload = *workload;
        join_set.spawn(async move {
            for _ in 0..workload.iterations {
                let _permit = limiter.permit().await;
                let _guard = probe.guard();
                if workload.work.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(workload.work).await;
                }
            }
        });
    }
    let mut failed = 0usize;
    while let Some(res) = join_set.join_next().await {
        if let Err(error) = res {
            tracing::error!("worker task failed: {:#}", &error);
            failed += 1;
        }
    }
    let elapsed = start.elapsed();
    resizer.abort();
    if failed > 0 {
        return Err(anyhow!("{failed} worker task(s) failed"));
    }
    let snapshot = limiter.snapshot();
    ensure_quiescent(snapshot)?;
    ensure_complete(
        Summary::new("tasks", elapsed, &counts, probe.get(), snapshot),
        workload,
    )
}
