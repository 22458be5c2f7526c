//! # KVBench Load Generator
//!
//! Purpose: Measure latency and throughput of a RESP key-value server under a
//! configurable SET/GET/DEL/EXISTS/PING mix, pipelined over a fixed set of
//! long-lived connections.
//!
//! ## Design Principles
//! 1. **One Worker per Connection**: Each worker owns its socket and result.
//! 2. **Immutable Configuration**: Built once from the CLI, shared by reference.
//! 3. **Typed Errors**: Connection failures stay inside workers; only
//!    run-level failures surface as `BenchError`.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod stats;
pub mod worker;
pub mod workload;

pub use config::{BenchConfig, Cli, WorkerConfig};
pub use error::{BenchError, BenchResult};
pub use orchestrator::{liveness_check, run};
pub use stats::{percentile, throughput, LatencySummary, Report};
pub use worker::{run_worker, PendingRequests, WorkerResult};
pub use workload::{CommandKind, CommandMix};
