//! # KVBench Client
//!
//! Purpose: Provide the blocking RESP2 client engine the load generator
//! drives: command encoding, streaming response decoding, and a connection
//! that can keep several requests in flight.
//!
//! ## Design Principles
//! 1. **Pipelining First**: Sending and receiving are separate operations.
//! 2. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.
//! 3. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.
//! 4. **Typed Failures**: Every error is a `ClientError` variant.

mod connection;
mod error;
mod resp;

pub use connection::{probe, resolve, ConnectConfig, Connection};
pub use error::{ClientError, ClientResult, ProtocolError};
pub use resp::{encode_command, RespReader, RespValue};
