//! Configuration types for runtime, limiter and workload settings

use anyhow::{Context, anyhow};

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
    /// Print the summary as JSON instead of text
    pub json: bool,
}

/// A capacity change applied at a fixed offset from the start of a run.
///
/// Parsed from `AT:N`, where `AT` is a human readable duration, e.g. `50ms:4` or `2s:1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeStep {
    pub at: std::time::Duration,
    pub capacity: i32,
}

impl std::str::FromStr for ResizeStep {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (at, capacity) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("expected AT:N (e.g. 50ms:4), got {s:?}"))?;
        let at = humantime::parse_duration(at.trim())
            .with_context(|| format!("invalid resize offset {at:?}"))?;
        let capacity = capacity
            .trim()
            .parse::<i32>()
            .with_context(|| format!("invalid resize capacity {capacity:?}"))?;
        Ok(Self { at, capacity })
    }
}

/// Limiter under test and the capacity changes applied to it
#[derive(Debug, Clone, Default)]
pub struct LimiterConfig {
    /// Initial capacity
    pub capacity: i32,
    /// Capacity changes, applied in order of `at`
    pub resizes: Vec<ResizeStep>,
}

impl LimiterConfig {
    /// Validate configuration and return errors if invalid
    ///
    /// Non-positive resize capacities are allowed: the limiter ignores them, and a schedule
    /// may include them on purpose to exercise that path.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.capacity < 1 {
            return Err(anyhow!(
                "capacity must be at least 1, got {}",
                self.capacity
            ));
        }
        Ok(())
    }

    /// Resize steps ordered by offset
    #[must_use]
    pub fn schedule(&self) -> Vec<ResizeStep> {
        let mut steps = self.resizes.clone();
        steps.sort_by_key(|step| step.at);
        steps
    }
}

/// Load generated against the limiter
#[derive(Debug, Clone, Copy)]
pub struct WorkloadConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Permits each worker takes, one after another
    pub iterations: usize,
    /// Time spent holding each permit
    pub work: std::time::Duration,
    /// Run workers as tokio tasks on an `AsyncLimiter` instead of threads on a `Limiter`
    pub use_async: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            iterations: 100,
            work: std::time::Duration::from_millis(1),
            use_async: false,
        }
    }
}

impl WorkloadConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(anyhow!("iterations must be at least 1"));
        }
        Ok(())
    }

    /// Total number of permits the workload takes
    #[must_use]
    pub fn operations(&self) -> u64 {
        (self.workers as u64) * (self.iterations as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_resize_step() {
        let step: ResizeStep = "50ms:4".parse().unwrap();
        assert_eq!(
            step,
            ResizeStep {
                at: Duration::from_millis(50),
                capacity: 4
            }
        );
        let step: ResizeStep = "1s:-3".parse().unwrap();
        assert_eq!(step.at, Duration::from_secs(1));
        assert_eq!(step.capacity, -3);
    }

    #[test]
    fn parse_resize_step_errors() {
        assert!("50ms".parse::<ResizeStep>().is_err());
        assert!("soon:4".parse::<ResizeStep>().is_err());
        assert!("10ms:lots".parse::<ResizeStep>().is_err());
    }

    #[test]
    fn schedule_is_sorted() {
        let config = LimiterConfig {
            capacity: 2,
            resizes: vec!["30ms:1".parse().unwrap(), "10ms:8".parse().unwrap()],
        };
        let schedule = config.schedule();
        assert_eq!(schedule[0].capacity, 8);
        assert_eq!(schedule[1].capacity, 1);
    }

    #[test]
    fn validation() {
        assert!(
            LimiterConfig {
                capacity: 0,
                resizes: vec![]
            }
            .validate()
            .is_err()
        );
        assert!(
            LimiterConfig {
                capacity: 1,
                resizes: vec![]
            }
            .validate()
            .is_ok()
        );
        let workload = WorkloadConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(workload.validate().is_err());
        assert!(WorkloadConfig::default().validate().is_ok());
        assert_eq!(WorkloadConfig::default().operations(), 800);
    }
}
