//! # RESP2 Encoding and Streaming Parsing
//!
//! Purpose: Encode benchmark commands and decode server responses from a
//! byte stream that may deliver data in arbitrarily small pieces.
//!
//! ## Design Principles
//! 1. **Buffer Reuse**: Callers hand in the output buffer for encoding; the
//!    reader keeps one growable `BytesMut` for the life of the connection.
//! 2. **Binary-Safe**: Bulk strings are treated as raw bytes.
//! 3. **Linear Line Scans**: A CRLF search never revisits bytes already
//!    scanned during the same line read, so large buffered chunks stay cheap.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.
//!
//! ## Stream Layout
//!
//! ```text
//! BytesMut: [ consumed | value being decoded ... | next pipelined reply ]
//!                       ^ front                    ^ left buffered
//! ```

use std::io::{self, Read};

use bytes::{Buf, BytesMut};

use crate::error::{ClientError, ClientResult, ProtocolError};

/// Bytes requested from the socket per read call.
const READ_CHUNK: usize = 8 * 1024;

/// Upper bound on pre-allocated array slots, whatever count the server claims.
const MAX_ARRAY_PREALLOC: usize = 1024;

/// Deepest array nesting accepted before the reply is rejected.
const MAX_NESTING: usize = 512;

/// RESP response value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style responses.
    Simple(String),
    /// -ERR ... responses.
    Error(String),
    /// :123 responses.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Vec<u8>>),
    /// *... arrays, with None for the null array.
    Array(Option<Vec<RespValue>>),
}

/// Encodes a RESP2 array-of-bulk-strings command into the provided buffer.
///
/// Lengths are byte lengths, so multi-byte UTF-8 arguments are framed
/// correctly. Existing buffer contents are preserved.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        push_usize(out, arg.len());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Incremental RESP2 decoder over any blocking byte source.
///
/// Bytes past the end of a decoded value stay buffered, so pipelined replies
/// can be drained one `read_one` call at a time.
pub struct RespReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: Read> RespReader<R> {
    /// Wraps a byte source with an empty buffer.
    pub fn new(inner: R) -> Self {
        RespReader {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Returns the wrapped source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Returns the wrapped source mutably, e.g. to write requests on a socket.
    ///
    /// Reading from it directly would desynchronize the buffer.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the source, dropping any undecoded buffered bytes.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Number of received bytes not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decodes exactly one response value, blocking on the source as needed.
    ///
    /// **Input**: none (reads from the wrapped source).
    /// **Output**: the next complete `RespValue`.
    ///
    /// **Logic**:
    /// 1. Take the type prefix byte.
    /// 2. Dispatch: lines for `+ - :`, length + payload for `$`, count +
    ///    recursive values for `*`.
    /// 3. Any other prefix is a protocol error; EOF mid-value is
    ///    `ConnectionClosed`. Arrays nested deeper than `MAX_NESTING` are
    ///    `NestingTooDeep`.
    pub fn read_one(&mut self) -> ClientResult<RespValue> {
        self.read_value(0)
    }

    fn read_value(&mut self, depth: usize) -> ClientResult<RespValue> {
        match self.read_prefix()? {
            b'+' => Ok(RespValue::Simple(self.read_text()?)),
            b'-' => Ok(RespValue::Error(self.read_text()?)),
            b':' => Ok(RespValue::Integer(self.read_integer()?)),
            b'$' => {
                let len = self.read_integer()?;
                self.read_bulk(len)
            }
            b'*' => {
                let count = self.read_integer()?;
                self.read_array(count, depth)
            }
            other => Err(ProtocolError::UnknownPrefix(other).into()),
        }
    }

    fn read_prefix(&mut self) -> ClientResult<u8> {
        if self.buf.is_empty() {
            self.fill()?;
        }
        Ok(self.buf.get_u8())
    }

    fn read_bulk(&mut self, len: i64) -> ClientResult<RespValue> {
        if len == -1 {
            return Ok(RespValue::Bulk(None));
        }
        let size = usize::try_from(len).map_err(|_| ProtocolError::InvalidLength(len))?;
        let data = self.take(size)?.to_vec();
        let crlf = self.take(2)?;
        if &crlf[..] != b"\r\n" {
            return Err(ProtocolError::MissingCrlf.into());
        }
        Ok(RespValue::Bulk(Some(data)))
    }

    fn read_array(&mut self, count: i64, depth: usize) -> ClientResult<RespValue> {
        if count == -1 {
            return Ok(RespValue::Array(None));
        }
        let count = usize::try_from(count).map_err(|_| ProtocolError::InvalidLength(count))?;
        if count > 0 && depth >= MAX_NESTING {
            return Err(ProtocolError::NestingTooDeep.into());
        }

        let mut items = Vec::with_capacity(count.min(MAX_ARRAY_PREALLOC));
        for _ in 0..count {
            items.push(self.read_value(depth + 1)?);
        }
        Ok(RespValue::Array(Some(items)))
    }

    fn read_text(&mut self) -> ClientResult<String> {
        let line = self.read_line()?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    fn read_integer(&mut self) -> ClientResult<i64> {
        let line = self.read_line()?;
        std::str::from_utf8(&line)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| ProtocolError::InvalidInteger.into())
    }

    /// Returns the next line with its CRLF stripped.
    fn read_line(&mut self) -> ClientResult<BytesMut> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find_crlf(&self.buf, scanned) {
                let line = self.buf.split_to(pos);
                self.buf.advance(2);
                return Ok(line);
            }
            // Keep the last byte in range: it may be a '\r' whose '\n' is
            // still in flight.
            scanned = self.buf.len().saturating_sub(1);
            self.fill()?;
        }
    }

    /// Removes exactly `len` bytes from the front of the buffer.
    fn take(&mut self, len: usize) -> ClientResult<BytesMut> {
        while self.buf.len() < len {
            self.fill()?;
        }
        Ok(self.buf.split_to(len))
    }

    /// Reads straight into the buffer's tail; the tail is cut back to what
    /// the source actually delivered.
    fn fill(&mut self) -> ClientResult<usize> {
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK, 0);
        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    return Err(ClientError::ConnectionClosed);
                }
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(err.into());
                }
            }
        }
    }
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|pair| pair == b"\r\n")
        .map(|pos| from + pos)
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    // Digits land in a stack buffer, least significant first.
    let mut digits = [0u8; 20];
    let mut len = 0;
    loop {
        digits[len] = b'0' + (value % 10) as u8;
        value /= 10;
        len += 1;
        if value == 0 {
            break;
        }
    }
    out.extend(digits[..len].iter().rev());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per read call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Trickle {
        fn new(data: &[u8], step: usize) -> Self {
            Trickle {
                data: data.to_vec(),
                pos: 0,
                step,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.step).min(self.data.len());
            let n = (end - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn read_all<R: Read>(reader: &mut RespReader<R>, count: usize) -> Vec<RespValue> {
        (0..count).map(|_| reader.read_one().unwrap()).collect()
    }

    fn parse(data: &[u8]) -> ClientResult<RespValue> {
        RespReader::new(Cursor::new(data.to_vec())).read_one()
    }

    #[test]
    fn encodes_command() {
        let mut buf = Vec::new();
        encode_command(&[b"GET", b"key"], &mut buf);
        assert_eq!(&buf, b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn encodes_ping_and_byte_lengths() {
        let mut buf = Vec::new();
        encode_command(&[b"PING"], &mut buf);
        assert_eq!(&buf, b"*1\r\n$4\r\nPING\r\n");

        buf.clear();
        encode_command(&["SET".as_bytes(), "k".as_bytes(), "é".as_bytes()], &mut buf);
        assert_eq!(&buf, "*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\né\r\n".as_bytes());
    }

    #[test]
    fn encodes_empty_and_long_arguments() {
        let long = vec![b'a'; 1234];
        let mut buf = Vec::new();
        encode_command(&[b"SET", b"", &long], &mut buf);
        let mut expected = b"*3\r\n$3\r\nSET\r\n$0\r\n\r\n$1234\r\n".to_vec();
        expected.extend_from_slice(&long);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(buf, expected);
    }

    #[test]
    fn parses_simple_string() {
        assert_eq!(parse(b"+OK\r\n").unwrap(), RespValue::Simple("OK".to_string()));
    }

    #[test]
    fn parses_bulk_string() {
        assert_eq!(
            parse(b"$5\r\nhello\r\n").unwrap(),
            RespValue::Bulk(Some(b"hello".to_vec()))
        );
    }

    #[test]
    fn parses_bulk_containing_crlf() {
        assert_eq!(
            parse(b"$4\r\na\r\nb\r\n").unwrap(),
            RespValue::Bulk(Some(b"a\r\nb".to_vec()))
        );
    }

    #[test]
    fn parses_null_bulk_string() {
        assert_eq!(parse(b"$-1\r\n").unwrap(), RespValue::Bulk(None));
    }

    #[test]
    fn parses_integer() {
        assert_eq!(parse(b":42\r\n").unwrap(), RespValue::Integer(42));
        assert_eq!(parse(b":-7\r\n").unwrap(), RespValue::Integer(-7));
    }

    #[test]
    fn parses_error() {
        assert_eq!(
            parse(b"-ERR bad\r\n").unwrap(),
            RespValue::Error("ERR bad".to_string())
        );
    }

    #[test]
    fn parses_nested_and_null_arrays() {
        let value = parse(b"*3\r\n:1\r\n*2\r\n+a\r\n$-1\r\n*-1\r\n").unwrap();
        assert_eq!(
            value,
            RespValue::Array(Some(vec![
                RespValue::Integer(1),
                RespValue::Array(Some(vec![
                    RespValue::Simple("a".to_string()),
                    RespValue::Bulk(None),
                ])),
                RespValue::Array(None),
            ]))
        );
        assert_eq!(parse(b"*0\r\n").unwrap(), RespValue::Array(Some(Vec::new())));
    }

    #[test]
    fn keeps_pipelined_replies_buffered() {
        let mut reader = RespReader::new(Cursor::new(b"+OK\r\n:1\r\n$1\r\nx\r\n".to_vec()));
        assert_eq!(reader.read_one().unwrap(), RespValue::Simple("OK".to_string()));
        assert!(reader.buffered() > 0);
        assert_eq!(reader.read_one().unwrap(), RespValue::Integer(1));
        assert_eq!(reader.read_one().unwrap(), RespValue::Bulk(Some(b"x".to_vec())));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn chunking_does_not_change_decoded_values() {
        let stream: &[u8] =
            b"+PONG\r\n-ERR no\r\n:12345\r\n$6\r\nfoobar\r\n$-1\r\n*2\r\n*1\r\n:0\r\n$0\r\n\r\n*-1\r\n";
        let mut whole = RespReader::new(Cursor::new(stream.to_vec()));
        let expected = read_all(&mut whole, 7);

        for step in [1, 2, 3, 5, 64] {
            let mut trickled = RespReader::new(Trickle::new(stream, step));
            assert_eq!(read_all(&mut trickled, 7), expected, "step {step}");
        }
    }

    #[test]
    fn large_bulk_across_many_reads() {
        let payload = vec![b'z'; 3 * READ_CHUNK + 17];
        let mut frame = format!("${}\r\n", payload.len()).into_bytes();
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(b"\r\n");

        let mut reader = RespReader::new(Trickle::new(&frame, 1000));
        assert_eq!(reader.read_one().unwrap(), RespValue::Bulk(Some(payload)));
    }

    #[test]
    fn command_round_trips_as_bulk_array() {
        let args: [&[u8]; 3] = [b"SET", b"key:7", b"abc\r\ndef"];
        let mut buf = Vec::new();
        encode_command(&args, &mut buf);

        let mut reader = RespReader::new(Trickle::new(&buf, 1));
        let expected = args.iter().map(|arg| RespValue::Bulk(Some(arg.to_vec()))).collect();
        assert_eq!(reader.read_one().unwrap(), RespValue::Array(Some(expected)));
    }

    #[test]
    fn rejects_unknown_prefix() {
        let err = parse(b"xyz\r\n").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::UnknownPrefix(b'x'))
        ));
    }

    #[test]
    fn rejects_malformed_lengths() {
        assert!(matches!(
            parse(b"$abc\r\n").unwrap_err(),
            ClientError::Protocol(ProtocolError::InvalidInteger)
        ));
        assert!(matches!(
            parse(b"$-2\r\n").unwrap_err(),
            ClientError::Protocol(ProtocolError::InvalidLength(-2))
        ));
        assert!(matches!(
            parse(b"*-5\r\n").unwrap_err(),
            ClientError::Protocol(ProtocolError::InvalidLength(-5))
        ));
    }

    #[test]
    fn rejects_arrays_nested_too_deep() {
        let mut deep = b"*1\r\n".repeat(200_000);
        deep.extend_from_slice(b":1\r\n");
        assert!(matches!(
            parse(&deep).unwrap_err(),
            ClientError::Protocol(ProtocolError::NestingTooDeep)
        ));

        let mut allowed = b"*1\r\n".repeat(MAX_NESTING);
        allowed.extend_from_slice(b":1\r\n");
        let mut value = parse(&allowed).unwrap();
        for _ in 0..MAX_NESTING {
            let RespValue::Array(Some(mut items)) = value else {
                panic!("expected nested array");
            };
            value = items.remove(0);
        }
        assert_eq!(value, RespValue::Integer(1));
    }

    #[test]
    fn fill_keeps_only_delivered_bytes() {
        let mut reader = RespReader::new(Cursor::new(b"+OK\r\n+PONG\r\n".to_vec()));
        assert_eq!(reader.read_one().unwrap(), RespValue::Simple("OK".into()));
        assert_eq!(reader.buffered(), 7);
        assert_eq!(reader.read_one().unwrap(), RespValue::Simple("PONG".into()));
        assert_eq!(reader.buffered(), 0);
        assert!(matches!(reader.read_one(), Err(ClientError::ConnectionClosed)));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn rejects_bulk_without_crlf() {
        assert!(matches!(
            parse(b"$3\r\nabcXY").unwrap_err(),
            ClientError::Protocol(ProtocolError::MissingCrlf)
        ));
    }

    #[test]
    fn reports_close_mid_message() {
        assert!(matches!(parse(b"").unwrap_err(), ClientError::ConnectionClosed));
        assert!(matches!(parse(b"+OK").unwrap_err(), ClientError::ConnectionClosed));
        assert!(matches!(
            parse(b"$10\r\nshort").unwrap_err(),
            ClientError::ConnectionClosed
        ));
        assert!(matches!(
            parse(b"*2\r\n:1\r\n").unwrap_err(),
            ClientError::ConnectionClosed
        ));
    }
}
