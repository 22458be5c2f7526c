//! # Connection Worker
//!
//! Purpose: Drive one connection through a fixed number of operations while
//! keeping up to `pipeline_depth` requests in flight, and time each request
//! from send to reply.
//!
//! ## Design Principles
//! 1. **FIFO Correlation**: No request IDs exist on the wire. The oldest
//!    pending timestamp always belongs to the next reply, which holds because
//!    the server answers a connection's commands in order.
//! 2. **Owned Results**: A worker appends only to its own `WorkerResult`,
//!    handed back by value when the worker finishes.
//! 3. **One Strike**: The first connection or protocol error ends the worker;
//!    it is counted once and never retried.
//!
//! ## Loop Shape
//!
//! ```text
//! while completed < ops:
//!     fill:  pending < depth && sent < ops  -> stamp, enqueue, send
//!     drain: one reply                       -> dequeue, record latency
//! ```

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use kvb_client::{ClientError, ClientResult, ConnectConfig, Connection, ProtocolError, RespValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::workload::Workload;

/// Send timestamps of unanswered requests, oldest first.
#[derive(Debug, Default)]
pub struct PendingRequests {
    sent_at: VecDeque<Instant>,
}

impl PendingRequests {
    pub fn with_capacity(capacity: usize) -> Self {
        PendingRequests {
            sent_at: VecDeque::with_capacity(capacity),
        }
    }

    /// Records a request about to be written.
    pub fn push(&mut self, sent_at: Instant) {
        self.sent_at.push_back(sent_at);
    }

    /// Pairs a reply received at `now` with the oldest request.
    ///
    /// Returns `None` if nothing is in flight.
    pub fn complete(&mut self, now: Instant) -> Option<Duration> {
        self.sent_at
            .pop_front()
            .map(|sent_at| now.saturating_duration_since(sent_at))
    }

    pub fn len(&self) -> usize {
        self.sent_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent_at.is_empty()
    }

    /// Forgets every in-flight request.
    pub fn clear(&mut self) {
        self.sent_at.clear();
    }
}

/// Outcome of one worker, owned by that worker until it returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerResult {
    /// Worker index within the run.
    pub worker: usize,
    /// Per-operation latency in milliseconds, in completion order.
    pub latencies_ms: Vec<f64>,
    /// Replies received and matched to a request.
    pub completed: u64,
    /// Fatal errors; at most one per worker.
    pub errors: u64,
    /// `-ERR` replies. These still count as completed operations.
    pub error_replies: u64,
}

impl WorkerResult {
    pub fn new(worker: usize) -> Self {
        WorkerResult {
            worker,
            ..WorkerResult::default()
        }
    }

    fn record(&mut self, latency: Duration) {
        self.latencies_ms.push(latency.as_secs_f64() * 1_000.0);
        self.completed += 1;
    }
}

/// Connects to the server and runs the worker to completion.
///
/// A failed connect counts as the worker's single error; no operation runs.
pub fn run_worker(id: usize, connect: &ConnectConfig, config: &WorkerConfig, seed: u64) -> WorkerResult {
    match Connection::connect(connect) {
        Ok(conn) => execute(id, conn, config, StdRng::seed_from_u64(seed)),
        Err(err) => {
            warn!(worker = id, error = %err, "worker could not connect");
            let mut result = WorkerResult::new(id);
            result.errors += 1;
            result
        }
    }
}

/// Runs the pipelined loop on an open connection, consuming it.
///
/// The connection is dropped (closed) on return, on every path.
pub fn execute<S, R>(id: usize, mut conn: Connection<S>, config: &WorkerConfig, rng: R) -> WorkerResult
where
    S: Read + Write,
    R: Rng,
{
    let mut result = WorkerResult::new(id);
    match drive(&mut conn, config, rng, &mut result) {
        Ok(()) => debug!(worker = id, completed = result.completed, "worker finished"),
        Err(err) => {
            warn!(
                worker = id,
                completed = result.completed,
                error = %err,
                "worker stopped after fatal error"
            );
            result.errors += 1;
        }
    }
    result
}

/// Core pipelining loop.
///
/// **Input**: an open connection, the shared config, an RNG, and the result
/// to append to.
/// **Output**: `Ok(())` once `config.ops` replies arrived, or the first error.
///
/// **Logic**:
/// 1. Fill: while fewer than `pipeline_depth` requests are pending and not
///    all operations are sent, stamp the send time, enqueue it, then write.
/// 2. Drain: decode one reply, pop the oldest stamp, record the latency.
/// 3. On error, pending requests are abandoned and the error is returned.
pub fn drive<S, R>(
    conn: &mut Connection<S>,
    config: &WorkerConfig,
    rng: R,
    result: &mut WorkerResult,
) -> ClientResult<()>
where
    S: Read + Write,
    R: Rng,
{
    let ops = config.ops as u64;
    let depth = config.pipeline_depth.max(1);
    let mut workload = Workload::new(config, rng);
    let mut pending = PendingRequests::with_capacity(depth);
    let mut sent = 0u64;

    while result.completed < ops {
        while pending.len() < depth && sent < ops {
            // Stamp once the command is built, right before it is written.
            let sent_ok = workload.with_next(|_, args| {
                pending.push(Instant::now());
                conn.send(args)
            });
            if let Err(err) = sent_ok {
                return Err(abandon(&mut pending, err));
            }
            sent += 1;
        }

        let reply = match conn.recv() {
            Ok(reply) => reply,
            Err(err) => return Err(abandon(&mut pending, err)),
        };
        // `pending` is never empty here: the fill step above always leaves
        // at least one request in flight while `completed < ops`.
        let latency = pending
            .complete(Instant::now())
            .ok_or(ProtocolError::UnsolicitedResponse)?;

        match reply {
            RespValue::Error(message) => {
                result.error_replies += 1;
                debug!(worker = result.worker, %message, "server returned error reply");
            }
            RespValue::Simple(_) | RespValue::Integer(_) | RespValue::Bulk(_) | RespValue::Array(_) => {}
        }
        result.record(latency);
    }

    Ok(())
}

fn abandon(pending: &mut PendingRequests, err: ClientError) -> ClientError {
    if !pending.is_empty() {
        debug!(abandoned = pending.len(), "discarding in-flight requests");
    }
    pending.clear();
    err
}
