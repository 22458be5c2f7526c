//! # Client Errors
//!
//! Purpose: Classify every way a benchmark connection can fail so callers can
//! decide what is fatal without string matching.
//!
//! ## Design Principles
//! 1. **Closed Taxonomy**: Connect, protocol, and peer-close failures are
//!    distinct variants; nothing is folded into a catch-all.
//! 2. **Fail Fast**: Any variant ends the connection it was raised on.

use std::io;

use thiserror::Error;

/// Result type for the client crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by connections and the RESP reader.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connect to the server failed or timed out.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Address could not be resolved into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Network failure while reading/writing an established connection.
    #[error("io error: {0}")]
    Io(io::Error),
    /// Response framing violated RESP2.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// Peer closed the connection before a full response arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => ClientError::ConnectionClosed,
            _ => ClientError::Io(err),
        }
    }
}

/// Specific RESP framing violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown type prefix {0:#04x}")]
    UnknownPrefix(u8),
    #[error("invalid integer line")]
    InvalidInteger,
    #[error("invalid length {0}")]
    InvalidLength(i64),
    #[error("bulk payload not terminated by CRLF")]
    MissingCrlf,
    #[error("array nesting too deep")]
    NestingTooDeep,
    /// A reply decoded while no request was pending. The pipelining loop
    /// only reads with at least one request in flight, so this marks a
    /// broken invariant rather than a server fault.
    #[error("response arrived with no request in flight")]
    UnsolicitedResponse,
}
