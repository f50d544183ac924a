//! Beam-Spot Replay
//!
//! Replays a recorded run through the beam-spot consistency monitor and writes
//! the resulting series as a JSON report.
//!
//! Usage:
//!   beamspot-replay --input run.json --config monitor.toml --output report.json
//!
//! Environment Variables:
//!   BEAMSPOT_CONFIG_PATH - Path to TOML config file
//!   BEAMSPOT_THREADS - Number of event worker threads (default: all cores)

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use beamspot_monitor::beam_monitor::{replay, MonitorConfig, ReplayInput};

#[derive(Parser, Debug)]
#[command(name = "beamspot-replay")]
#[command(about = "Replay a recorded run through the beam-spot consistency monitor")]
struct Args {
    /// Path to the recorded run (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long, env = "BEAMSPOT_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Where to write the JSON report (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of event worker threads
    #[arg(short, long, env = "BEAMSPOT_THREADS")]
    threads: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        info!("Loading config from {}", config_path.display());
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading config {}", config_path.display()))?;
        toml::from_str(&content)?
    } else {
        info!("Using default configuration");
        MonitorConfig::default()
    };

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring worker threads")?;
    }

    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading run {}", args.input.display()))?;
    let input: ReplayInput = serde_json::from_str(&content)
        .with_context(|| format!("parsing run {}", args.input.display()))?;

    let monitor = input.monitor(config);
    let outcome = replay(&monitor, &input)?;
    if outcome.rejected_events > 0 {
        warn!("{} events were rejected", outcome.rejected_events);
    }
    info!(
        "Run {}: {} intervals replayed, {} series normalized",
        input.run,
        outcome.intervals.len(),
        outcome.normalized_series
    );

    let json = monitor.report().to_json()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
