//! # Benchmark Errors
//!
//! Run-level failures. Connection-level failures never show up here: workers
//! absorb them into their error counters.

use std::io;
use std::path::PathBuf;

use kvb_client::ClientError;
use thiserror::Error;

/// Result type for benchmark operations.
pub type BenchResult<T> = Result<T, BenchError>;

/// Errors that stop a run (or prevent it from starting).
#[derive(Debug, Error)]
pub enum BenchError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Pre-flight connect probe failed; no worker was started.
    #[error("liveness check against {addr} failed: {source}")]
    Liveness {
        addr: String,
        #[source]
        source: ClientError,
    },
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker {id}: {source}")]
    Spawn {
        id: usize,
        #[source]
        source: io::Error,
    },
    /// Writing run output failed.
    #[error("failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}
