//! # Load Orchestrator
//!
//! Purpose: Fan a fixed operation budget out over independent connection
//! workers, wait for all of them, and fold their results into one report.
//!
//! ## Design Principles
//! 1. **Fan-Out/Fan-In**: One scoped thread per connection; the only
//!    synchronization is the final join.
//! 2. **Shared Nothing**: Workers borrow the immutable `WorkerConfig` and
//!    return owned `WorkerResult`s. No locks, no shared counters.
//! 3. **Fail Before Work**: A pre-flight connect probe aborts the run before
//!    any worker starts; after that, the run always completes and reports.

use std::panic;
use std::thread;
use std::time::{Duration, Instant};

use kvb_client::{probe, ConnectConfig};
use tracing::{info, warn};

use crate::config::{BenchConfig, WorkerConfig};
use crate::error::{BenchError, BenchResult};
use crate::stats::Report;
use crate::worker::{run_worker, WorkerResult};

/// Golden-ratio increment used to spread per-worker seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Connects to `addr` and closes again, failing the run if that is impossible.
pub fn liveness_check(addr: &str, timeout: Duration) -> BenchResult<()> {
    probe(addr, timeout).map_err(|source| BenchError::Liveness {
        addr: addr.to_string(),
        source,
    })
}

/// Seed for worker `id`, derived from the run seed.
pub fn worker_seed(base: u64, id: usize) -> u64 {
    base ^ (id as u64).wrapping_add(1).wrapping_mul(SEED_STRIDE)
}

/// Executes a full benchmark run.
///
/// **Input**: validated `BenchConfig`.
/// **Output**: the merged `Report`, or an error if the run could not start.
///
/// **Logic**:
/// 1. Validate the config and probe the server.
/// 2. Split `total_ops` evenly; the remainder is dropped.
/// 3. Spawn every worker, join every worker, merge.
pub fn run(config: &BenchConfig) -> BenchResult<Report> {
    config.validate()?;
    liveness_check(&config.addr, config.liveness_timeout())?;

    let worker_config = config.worker_config();
    let connect = config.connect_config();
    let dropped = config.dropped_ops();
    if dropped > 0 {
        warn!(
            dropped,
            total_ops = config.total_ops,
            concurrency = config.concurrency,
            "operation budget not divisible by concurrency; remainder will not run"
        );
    }
    info!(
        addr = %config.addr,
        concurrency = config.concurrency,
        per_worker_ops = worker_config.ops,
        pipeline_depth = worker_config.pipeline_depth,
        "starting benchmark"
    );

    let start = Instant::now();
    let results = spawn_workers(config, &connect, &worker_config)?;
    let elapsed = start.elapsed();

    let report = Report::from_results(config.addr.clone(), results, elapsed);
    info!(
        total_ops = report.total_ops,
        total_errors = report.total_errors,
        elapsed_secs = report.elapsed_secs,
        "benchmark finished"
    );
    Ok(report)
}

fn spawn_workers(
    config: &BenchConfig,
    connect: &ConnectConfig,
    worker_config: &WorkerConfig,
) -> BenchResult<Vec<WorkerResult>> {
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(config.concurrency);
        for id in 0..config.concurrency {
            let seed = worker_seed(config.seed, id);
            let handle = thread::Builder::new()
                .name(format!("kvb-worker-{id}"))
                .spawn_scoped(scope, move || run_worker(id, connect, worker_config, seed))
                .map_err(|source| BenchError::Spawn { id, source })?;
            handles.push(handle);
        }

        // A panicking worker is a bug, not a connection error; re-raise it.
        Ok(handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
            .collect())
    })
}
