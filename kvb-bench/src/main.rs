//! # KVBench CLI
//!
//! Parse arguments, run the benchmark, print the report. Logs go to stderr
//! (filter via `RUST_LOG`, default `info`); the report goes to stdout.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kvb_bench::{orchestrator, output, Cli};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("kvb-bench failed: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.to_config().context("invalid arguments")?;
    let report = orchestrator::run(&config).context("benchmark run failed")?;

    if let Some(path) = &cli.latency_file {
        output::write_latencies(path, &report.latencies_ms)?;
        info!(path = %path.display(), samples = report.latencies_ms.len(), "latency samples written");
    }

    if cli.json {
        println!("{}", output::to_json(&config, &report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}
