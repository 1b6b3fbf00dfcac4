//! Shared plumbing for the fairlimit tools
//!
//! - [`config`] - runtime, output, limiter and workload settings
//! - [`probe`] - instrumentation counting concurrent permit holders
//! - [`workload`] - drives a limiter with threads or tokio tasks under a resize schedule
//! - [`run`] - sets up logging and the tokio runtime, runs a tool and reports its summary

use tracing::instrument;

pub mod config;
pub mod probe;
pub mod workload;

pub use config::{LimiterConfig, OutputConfig, ResizeStep, RuntimeConfig, WorkloadConfig};

fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(output: &OutputConfig) {
    let default_filter = if output.quiet {
        "off"
    } else {
        verbosity_filter(output.verbose)
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    // a subscriber may already be installed (e.g. by a test harness)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(output.verbose > 2)
        .try_init();
}

fn build_runtime(runtime: &RuntimeConfig) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    Ok(builder.build()?)
}

fn report(output: &OutputConfig, summary: &workload::Summary) -> anyhow::Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else if output.print_summary || output.verbose > 0 {
        println!("{summary}");
    }
    Ok(())
}

/// Run a tool's async entry point with logging and a tokio runtime configured.
///
/// Returns `None` if the tool failed; the error has already been printed unless
/// `output.quiet` is set.
#[instrument(skip(func))]
pub fn run<Fut>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<workload::Summary>
where
    Fut: std::future::Future<Output = anyhow::Result<workload::Summary>>,
{
    init_tracing(&output);
    let res = build_runtime(&runtime).and_then(|runtime| runtime.block_on(func()));
    match res {
        Ok(summary) => {
            if let Err(error) = report(&output, &summary) {
                if !output.quiet {
                    eprintln!("{error:#}");
                }
                return None;
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            if !output.quiet {
                eprintln!("{error:#}");
            }
            None
        }
    }
}
