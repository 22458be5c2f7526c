//! # Benchmark Connection
//!
//! Purpose: Own one long-lived TCP connection and expose the two halves a
//! pipelining driver needs separately: send a command, receive a reply.
//!
//! ## Design Principles
//! 1. **Split Send/Receive**: Unlike a request/response `exec`, sends and
//!    receives are independent so several requests can be in flight.
//! 2. **Buffer Reuse**: The write buffer and the reader buffer live as long
//!    as the connection.
//! 3. **Transport Agnostic**: Any `Read + Write` stream works, which keeps the
//!    pipelining logic testable without sockets.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::resp::{encode_command, RespReader, RespValue};

/// Socket settings for benchmark connections.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server address, e.g. "127.0.0.1:9000".
    pub addr: String,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
}

impl ConnectConfig {
    /// Plain blocking settings for `addr`: no timeouts.
    pub fn new(addr: impl Into<String>) -> Self {
        ConnectConfig {
            addr: addr.into(),
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Single connection with a reusable encode buffer and a streaming reader.
pub struct Connection<S = TcpStream> {
    reader: RespReader<S>,
    write_buf: Vec<u8>,
}

impl Connection<TcpStream> {
    /// Opens a TCP connection with the configured timeouts and `TCP_NODELAY`.
    ///
    /// Every failure before the socket is usable is reported as
    /// `ClientError::Connect` (or `InvalidAddress`).
    pub fn connect(config: &ConnectConfig) -> ClientResult<Self> {
        let stream = connect_stream(&config.addr, config.connect_timeout)?;
        let configure = |stream: &TcpStream| -> std::io::Result<()> {
            stream.set_read_timeout(config.read_timeout)?;
            stream.set_write_timeout(config.write_timeout)?;
            // Disable Nagle so small pipelined requests are not delayed.
            stream.set_nodelay(true)
        };
        configure(&stream).map_err(|source| ClientError::Connect {
            addr: config.addr.clone(),
            source,
        })?;

        debug!(addr = %config.addr, "connection established");
        Ok(Connection::from_stream(stream))
    }
}

impl<S: Read + Write> Connection<S> {
    /// Wraps an already-open stream.
    pub fn from_stream(stream: S) -> Self {
        Connection {
            reader: RespReader::new(stream),
            write_buf: Vec::with_capacity(256),
        }
    }

    /// Encodes `args` and writes the whole command to the stream.
    pub fn send(&mut self, args: &[&[u8]]) -> ClientResult<()> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;
        Ok(())
    }

    /// Blocks until one full response has been decoded.
    pub fn recv(&mut self) -> ClientResult<RespValue> {
        self.reader.read_one()
    }

    /// Returns the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Unwraps the stream, dropping any undecoded buffered bytes.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Connects and immediately closes, proving the server accepts connections.
pub fn probe(addr: &str, timeout: Duration) -> ClientResult<()> {
    let stream = connect_stream(addr, Some(timeout))?;
    // The peer may already have hung up; the probe only cares about connect.
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

/// Resolves `addr` to its first socket address.
pub fn resolve(addr: &str) -> ClientResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|_| ClientError::InvalidAddress(addr.to_string()))?
        .next()
        .ok_or_else(|| ClientError::InvalidAddress(addr.to_string()))
}

fn connect_stream(addr: &str, timeout: Option<Duration>) -> ClientResult<TcpStream> {
    let sock_addr = resolve(addr)?;
    let stream = match timeout {
        Some(timeout) => TcpStream::connect_timeout(&sock_addr, timeout),
        None => TcpStream::connect(sock_addr),
    };
    stream.map_err(|source| ClientError::Connect {
        addr: addr.to_string(),
        source,
    })
}
