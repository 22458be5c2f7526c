//! # Benchmark Configuration
//!
//! Purpose: Parse the command line into one immutable `BenchConfig`, validate
//! it once, and derive the read-only `WorkerConfig` every worker shares.
//!
//! ## Design Principles
//! 1. **Validate at the Edge**: Nothing downstream re-checks ratios or sizes.
//! 2. **Immutable Sharing**: Workers borrow the same `WorkerConfig`; there is
//!    no process-wide mutable state.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use kvb_client::ConnectConfig;
use serde::Serialize;

use crate::error::{BenchError, BenchResult};
use crate::workload::CommandMix;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_TOTAL_OPS: usize = 200_000;
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_KEYSPACE_SIZE: usize = 200;
pub const DEFAULT_VALUE_LEN: usize = 16;
pub const DEFAULT_SET_RATIO: f64 = 0.4;
pub const DEFAULT_GET_RATIO: f64 = 0.4;
pub const DEFAULT_DEL_RATIO: f64 = 0.1;
pub const DEFAULT_EXISTS_RATIO: f64 = 0.05;
pub const DEFAULT_PIPELINE_DEPTH: usize = 16;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_LIVENESS_TIMEOUT_MS: u64 = 1_000;

/// Slack for ratio sums such as 0.1 + 0.2 that overshoot in binary.
const RATIO_EPSILON: f64 = 1e-9;

/// Command-line interface for the load generator.
#[derive(Debug, Clone, Parser)]
#[command(name = "kvb-bench", version, about = "Pipelined RESP load generator")]
pub struct Cli {
    /// Server host.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,
    /// Server port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Total operations across all connections.
    #[arg(long = "ops", default_value_t = DEFAULT_TOTAL_OPS)]
    pub total_ops: usize,
    /// Number of connections (one worker thread each).
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Number of distinct keys (`key:0` .. `key:N-1`).
    #[arg(long, default_value_t = DEFAULT_KEYSPACE_SIZE)]
    pub keyspace: usize,
    /// Length of SET values in bytes.
    #[arg(long, default_value_t = DEFAULT_VALUE_LEN)]
    pub value_len: usize,
    #[arg(long, default_value_t = DEFAULT_SET_RATIO)]
    pub set_ratio: f64,
    #[arg(long, default_value_t = DEFAULT_GET_RATIO)]
    pub get_ratio: f64,
    #[arg(long, default_value_t = DEFAULT_DEL_RATIO)]
    pub del_ratio: f64,
    #[arg(long, default_value_t = DEFAULT_EXISTS_RATIO)]
    pub exists_ratio: f64,
    /// Maximum in-flight requests per connection.
    #[arg(short = 'P', long, default_value_t = DEFAULT_PIPELINE_DEPTH)]
    pub pipeline: usize,
    /// Base PRNG seed; each worker derives its own stream from it.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
    /// Connect timeout for the pre-flight probe.
    #[arg(long, default_value_t = DEFAULT_LIVENESS_TIMEOUT_MS)]
    pub liveness_timeout_ms: u64,
    /// Read/write timeout on worker connections (off by default).
    #[arg(long)]
    pub io_timeout_ms: Option<u64>,
    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
    /// Write pooled latency samples (ms, one per line) to this file.
    #[arg(long)]
    pub latency_file: Option<PathBuf>,
}

impl Cli {
    /// Builds and validates the run configuration.
    pub fn to_config(&self) -> BenchResult<BenchConfig> {
        let config = BenchConfig {
            addr: format!("{}:{}", self.host, self.port),
            total_ops: self.total_ops,
            concurrency: self.concurrency,
            keyspace_size: self.keyspace,
            value_len: self.value_len,
            mix: CommandMix {
                set: self.set_ratio,
                get: self.get_ratio,
                del: self.del_ratio,
                exists: self.exists_ratio,
            },
            pipeline_depth: self.pipeline,
            seed: self.seed,
            liveness_timeout_ms: self.liveness_timeout_ms,
            io_timeout_ms: self.io_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Immutable parameters for one run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchConfig {
    /// Server address, e.g. "127.0.0.1:9000".
    pub addr: String,
    pub total_ops: usize,
    pub concurrency: usize,
    pub keyspace_size: usize,
    pub value_len: usize,
    pub mix: CommandMix,
    pub pipeline_depth: usize,
    pub seed: u64,
    pub liveness_timeout_ms: u64,
    pub io_timeout_ms: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            addr: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
            total_ops: DEFAULT_TOTAL_OPS,
            concurrency: DEFAULT_CONCURRENCY,
            keyspace_size: DEFAULT_KEYSPACE_SIZE,
            value_len: DEFAULT_VALUE_LEN,
            mix: CommandMix {
                set: DEFAULT_SET_RATIO,
                get: DEFAULT_GET_RATIO,
                del: DEFAULT_DEL_RATIO,
                exists: DEFAULT_EXISTS_RATIO,
            },
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
            seed: DEFAULT_SEED,
            liveness_timeout_ms: DEFAULT_LIVENESS_TIMEOUT_MS,
            io_timeout_ms: None,
        }
    }
}

impl BenchConfig {
    /// Checks every invariant the workers rely on.
    pub fn validate(&self) -> BenchResult<()> {
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.pipeline_depth == 0 {
            return Err(invalid("pipeline depth must be at least 1"));
        }
        if self.keyspace_size == 0 {
            return Err(invalid("keyspace must contain at least one key"));
        }

        let ratios = [
            ("set", self.mix.set),
            ("get", self.mix.get),
            ("del", self.mix.del),
            ("exists", self.mix.exists),
        ];
        for (name, ratio) in ratios {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(invalid(format!("{name} ratio {ratio} is outside [0, 1]")));
            }
        }
        let total = self.mix.total();
        if total > 1.0 + RATIO_EPSILON {
            return Err(invalid(format!("command ratios sum to {total}, above 1.0")));
        }
        Ok(())
    }

    /// Operations each worker runs; the division remainder is dropped.
    pub fn per_worker_ops(&self) -> usize {
        self.total_ops / self.concurrency.max(1)
    }

    /// Operations lost to integer division.
    pub fn dropped_ops(&self) -> usize {
        self.total_ops % self.concurrency.max(1)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    /// Socket settings for worker connections.
    pub fn connect_config(&self) -> ConnectConfig {
        let io_timeout = self.io_timeout_ms.map(Duration::from_millis);
        ConnectConfig {
            addr: self.addr.clone(),
            connect_timeout: None,
            read_timeout: io_timeout,
            write_timeout: io_timeout,
        }
    }

    /// Builds the config shared read-only by all workers.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            ops: self.per_worker_ops(),
            keyspace: (0..self.keyspace_size).map(|idx| format!("key:{idx}")).collect(),
            value_len: self.value_len,
            mix: self.mix,
            pipeline_depth: self.pipeline_depth,
        }
    }
}

/// Per-worker parameters, identical for every worker in a run.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Operations this worker completes before stopping.
    pub ops: usize,
    /// Keys sampled uniformly by SET/GET/DEL/EXISTS. Must be non-empty.
    pub keyspace: Vec<String>,
    pub value_len: usize,
    pub mix: CommandMix,
    /// Maximum unanswered requests on the connection.
    pub pipeline_depth: usize,
}

fn invalid(message: impl Into<String>) -> BenchError {
    BenchError::InvalidConfig(message.into())
}
