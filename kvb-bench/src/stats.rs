//! # Latency Aggregation
//!
//! Merge per-worker results into one run report: totals, throughput, and
//! nearest-rank percentiles over the pooled latency samples.
//!
//! ## Notes
//! - Percentiles select an observed sample at index `floor(p/100 * (n-1))`
//!   of the sorted samples; there is no interpolation.
//! - Samples are pooled without regard to which worker produced them.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::worker::WorkerResult;

/// Nearest-rank percentile of unsorted samples. `None` when empty.
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

/// Nearest-rank percentile of samples already sorted ascending.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p.clamp(0.0, 100.0) / 100.0 * last as f64).floor() as usize;
    sorted.get(rank.min(last)).copied()
}

/// Completed operations per second; `None` if no time elapsed.
pub fn throughput(ops: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        Some(ops as f64 / secs)
    } else {
        None
    }
}

/// Percentiles reported for a run, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl LatencySummary {
    pub fn from_sorted(sorted: &[f64]) -> Self {
        LatencySummary {
            p50: percentile_sorted(sorted, 50.0),
            p95: percentile_sorted(sorted, 95.0),
            p99: percentile_sorted(sorted, 99.0),
        }
    }
}

/// Aggregate outcome of a run, derived once after every worker finished.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Server address the run targeted.
    pub addr: String,
    pub workers: usize,
    pub total_ops: u64,
    pub total_errors: u64,
    pub error_replies: u64,
    pub elapsed_secs: f64,
    pub throughput: Option<f64>,
    pub latency: LatencySummary,
    /// Pooled samples in milliseconds, sorted ascending.
    #[serde(skip)]
    pub latencies_ms: Vec<f64>,
}

impl Report {
    /// Merges worker results.
    ///
    /// **Logic**:
    /// 1. Sum completed ops, fatal errors and error replies.
    /// 2. Pool every worker's samples and sort them once.
    /// 3. Derive percentiles and throughput from the pooled data.
    pub fn from_results(addr: impl Into<String>, results: Vec<WorkerResult>, elapsed: Duration) -> Self {
        let workers = results.len();
        let mut total_ops = 0;
        let mut total_errors = 0;
        let mut error_replies = 0;
        let mut latencies_ms = Vec::with_capacity(results.iter().map(|r| r.latencies_ms.len()).sum());

        for result in results {
            total_ops += result.completed;
            total_errors += result.errors;
            error_replies += result.error_replies;
            latencies_ms.extend(result.latencies_ms);
        }
        latencies_ms.sort_by(f64::total_cmp);

        Report {
            addr: addr.into(),
            workers,
            total_ops,
            total_errors,
            error_replies,
            elapsed_secs: elapsed.as_secs_f64(),
            throughput: throughput(total_ops, elapsed),
            latency: LatencySummary::from_sorted(&latencies_ms),
            latencies_ms,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server: {}", self.addr)?;
        writeln!(
            f,
            "Completed ops: {}, errors: {}, elapsed: {:.3}s",
            self.total_ops, self.total_errors, self.elapsed_secs
        )?;
        if self.error_replies > 0 {
            writeln!(f, "Error replies: {}", self.error_replies)?;
        }
        if let Some(ops_per_sec) = self.throughput {
            writeln!(f, "Throughput: {ops_per_sec:.1} ops/sec")?;
        }
        let rows = [
            ("p50", self.latency.p50),
            ("p95", self.latency.p95),
            ("p99", self.latency.p99),
        ];
        for (label, value) in rows {
            if let Some(ms) = value {
                writeln!(f, "{label}: {ms:.2} ms")?;
            }
        }
        Ok(())
    }
}
