//! Line transport over an ordered, reliable byte stream.
//!
//! The stream delivers bytes with no message boundaries, so a single `\n` is
//! the only framing. `LineConnection` owns the stream together with a read
//! buffer: bytes that arrive after a delimiter stay in the buffer and are
//! handed out by the next `receive_line` call rather than being consumed.
//!
//! Dropping a `LineConnection` drops (and so closes) the underlying stream,
//! which gives every session a single owner that releases the socket on all
//! exit paths.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::protocols::ping::parser::DELIMITER;

/// Read buffer growth step
const BUFFER_SIZE: usize = 1024;

/// Which half of the stream an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
        }
    }
}

/// Failures of the underlying send/receive primitives.
///
/// Always fatal to the connection; never retried by the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream reported an error other than an interruption.
    #[error("{op}: {source}")]
    Io {
        op: Operation,
        #[source]
        source: io::Error,
    },

    /// A configured read or write deadline expired.
    #[error("{op}: timed out after {}ms", .after.as_millis())]
    TimedOut { op: Operation, after: Duration },

    /// The peer sent more than `limit` bytes without completing a line.
    #[error("read: line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

impl TransportError {
    fn io(op: Operation, source: io::Error) -> Self {
        TransportError::Io { op, source }
    }
}

/// Result of waiting for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete line, trailing `\n` included.
    Line(Bytes),
    /// End of stream. Any undelimited bytes left over were discarded.
    Closed,
}

/// Optional hardening limits. The default imposes none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineLimits {
    /// Maximum line length in bytes, delimiter included.
    pub max_line_length: Option<usize>,
    /// Deadline for a whole `receive_line` call.
    pub read_timeout: Option<Duration>,
    /// Deadline for a whole `send` call.
    pub write_timeout: Option<Duration>,
}

/// A stream connection speaking newline-delimited text.
pub struct LineConnection<S> {
    stream: S,
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no delimiter.
    scanned: usize,
    limits: LineLimits,
}

impl<S> LineConnection<S> {
    pub fn new(stream: S, limits: LineLimits) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(BUFFER_SIZE),
            scanned: 0,
            limits,
        }
    }

    /// Release the stream. Buffered but unread bytes are dropped.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Split a complete line off the front of the buffer, if one is there.
    fn take_line(&mut self) -> Result<Option<Bytes>, TransportError> {
        let found = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER);

        match found {
            Some(pos) => {
                let end = self.scanned + pos + 1;
                if let Some(limit) = self.limits.max_line_length {
                    if end > limit {
                        return Err(TransportError::LineTooLong { limit });
                    }
                }
                self.scanned = 0;
                Ok(Some(self.buffer.split_to(end).freeze()))
            }
            None => {
                self.scanned = self.buffer.len();
                if let Some(limit) = self.limits.max_line_length {
                    // Any line completed from here on would exceed the limit.
                    if self.buffer.len() >= limit {
                        return Err(TransportError::LineTooLong { limit });
                    }
                }
                Ok(None)
            }
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineConnection<S> {
    /// Write all of `bytes`, or fail. Partial writes are resumed from the
    /// last offset; interruptions are retried.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let deadline = self.limits.write_timeout;
        with_deadline(Operation::Write, deadline, self.write_fully(bytes)).await
    }

    /// Wait for the next `\n`-terminated line.
    ///
    /// Returns `Received::Closed` when the stream ends, including when it ends
    /// in the middle of a line. A zero-length line is never produced.
    pub async fn receive_line(&mut self) -> Result<Received, TransportError> {
        let deadline = self.limits.read_timeout;
        with_deadline(Operation::Read, deadline, self.read_line()).await
    }

    /// Best-effort orderly close of the write half.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "Shutdown failed");
        }
    }

    async fn write_fully(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut offset = 0;

        while offset < bytes.len() {
            match self.stream.write(&bytes[offset..]).await {
                Ok(0) => {
                    return Err(TransportError::io(
                        Operation::Write,
                        io::ErrorKind::WriteZero.into(),
                    ))
                }
                Ok(n) => {
                    offset += n;
                    trace!(written = n, remaining = bytes.len() - offset, "Wrote bytes");
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::io(Operation::Write, e)),
            }
        }

        loop {
            match self.stream.flush().await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::io(Operation::Write, e)),
            }
        }
    }

    async fn read_line(&mut self) -> Result<Received, TransportError> {
        loop {
            if let Some(line) = self.take_line()? {
                return Ok(Received::Line(line));
            }

            if self.buffer.capacity() == self.buffer.len() {
                self.buffer.reserve(BUFFER_SIZE);
            }

            match self.stream.read_buf(&mut self.buffer).await {
                Ok(0) => {
                    if !self.buffer.is_empty() {
                        debug!(
                            discarded = self.buffer.len(),
                            "Stream ended inside a line"
                        );
                        self.buffer.clear();
                        self.scanned = 0;
                    }
                    return Ok(Received::Closed);
                }
                Ok(n) => trace!(read = n, "Read bytes"),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::io(Operation::Read, e)),
            }
        }
    }
}

async fn with_deadline<T, F>(
    op: Operation,
    deadline: Option<Duration>,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match deadline {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| TransportError::TimedOut { op, after })?,
        None => fut.await,
    }
}
