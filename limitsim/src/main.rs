use anyhow::{Context, Result};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "limitsim",
    version,
    about = "Drive a resizable concurrency limiter with a synthetic workload",
    long_about = "`limitsim` runs a number of workers that repeatedly take a permit from a limiter, hold it \
for a while and release it, optionally resizing the limiter on a schedule while they run.

EXAMPLE:
    # 50 workers sharing 3 permits, grown to 10 after 200ms and shrunk to 1 after 1s
    limitsim --capacity 3 --workers 50 --resize 200ms:10 --resize 1s:1 --summary"
)]
struct Args {
    // Limiter
    /// Initial capacity of the limiter
    #[arg(
        long,
        default_value = "4",
        value_name = "N",
        help_heading = "Limiter"
    )]
    capacity: i32,

    /// Resize the limiter to N permits at offset AT from the start (can be specified multiple times)
    ///
    /// AT accepts a human readable duration, e.g. "200ms:10" or "2s:1". Sizes below 1 are ignored by
    /// the limiter and reported as such in the summary.
    #[arg(long, value_name = "AT:N", action = clap::ArgAction::Append, help_heading = "Limiter")]
    resize: Vec<common::ResizeStep>,

    // Workload
    /// Number of concurrent workers
    #[arg(
        long,
        default_value = "8",
        value_name = "N",
        help_heading = "Workload"
    )]
    workers: usize,

    /// Number of permits each worker takes
    #[arg(
        long,
        default_value = "100",
        value_name = "N",
        help_heading = "Workload"
    )]
    iterations: usize,

    /// Time each worker holds a permit
    ///
    /// This option accepts a human readable duration, e.g. "1ms", "250us", "0s" etc.
    #[arg(
        long,
        default_value = "1ms",
        value_name = "DURATION",
        help_heading = "Workload"
    )]
    work: String,

    /// Run workers as tokio tasks instead of native threads
    #[arg(long = "async", help_heading = "Workload")]
    use_async: bool,

    // Progress & output
    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Print the summary as JSON
    #[arg(long, help_heading = "Progress & output")]
    json: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,
}

#[instrument]
async fn async_main(args: Args) -> Result<common::workload::Summary> {
    let work = humantime::parse_duration(&args.work)
        .with_context(|| format!("invalid --work duration {:?}", &args.work))?;
    let limiter = common::LimiterConfig {
        capacity: args.capacity,
        resizes: args.resize,
    };
    let workload = common::WorkloadConfig {
        workers: args.workers,
        iterations: args.iterations,
        work,
        use_async: args.use_async,
    };
    if workload.use_async {
        return common::workload::run_tasks(&limiter, &workload).await;
    }
    // blocking workers park native threads, keep them off the async workers
    tokio::task::spawn_blocking(move || common::workload::run_threads(&limiter, &workload))
        .await
        .context("workload thread failed")?
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
        json: args.json,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(output, runtime, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
