//! Ping protocol handler for the Tokio runtime.

use bytes::Bytes;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::parser::{
    parse, printable, response_error, response_pong, Command, ParseResult,
    REASON_EXPECTED_PING, REASON_LINE_TOO_LONG,
};
use crate::connection::{LineConnection, Received, TransportError};

/// Why a session ended without a transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client closed the stream between lines. Expected behaviour.
    PeerClosed,
    /// Client sent something other than `PING\n`; an error reply was sent.
    ProtocolViolation { received: Bytes },
    /// Client exceeded the configured line limit; an error reply was sent.
    LineTooLong { limit: usize },
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => write!(f, "closed by client"),
            SessionEnd::ProtocolViolation { received } => {
                write!(f, "protocol violation (got \"{}\")", printable(received))
            }
            SessionEnd::LineTooLong { limit } => write!(f, "line longer than {limit} bytes"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Completed PING/PONG exchanges.
    pub exchanges: u64,
    pub end: SessionEnd,
}

/// Handle a ping protocol connection.
///
/// Reads one line at a time and answers each `PING\n` with `PONG\n`. The
/// first line that is not exactly `PING\n` gets `ERROR: expected PING\n`
/// and ends the session; nothing further is read from the stream.
///
/// The connection is consumed, so it is closed on every return path.
pub async fn handle_connection<S>(
    mut conn: LineConnection<S>,
) -> Result<SessionReport, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut exchanges = 0;

    loop {
        let line = match conn.receive_line().await {
            Ok(Received::Line(line)) => line,
            Ok(Received::Closed) => {
                debug!(exchanges, "Connection closed by client");
                return Ok(SessionReport {
                    exchanges,
                    end: SessionEnd::PeerClosed,
                });
            }
            Err(TransportError::LineTooLong { limit }) => {
                warn!(limit, "Line exceeds limit");
                conn.send(&response_error(REASON_LINE_TOO_LONG)).await?;
                conn.shutdown().await;
                return Ok(SessionReport {
                    exchanges,
                    end: SessionEnd::LineTooLong { limit },
                });
            }
            Err(e) => return Err(e),
        };

        debug!(line = %printable(&line), "Received");

        match parse(&line) {
            ParseResult::Complete(Command::Ping) => {
                conn.send(response_pong()).await?;
                exchanges += 1;
                debug!("Sent PONG");
            }
            ParseResult::Invalid => {
                warn!(received = %printable(&line), "Protocol error: expected PING");
                conn.send(&response_error(REASON_EXPECTED_PING)).await?;
                conn.shutdown().await;
                return Ok(SessionReport {
                    exchanges,
                    end: SessionEnd::ProtocolViolation { received: line },
                });
            }
        }
    }
}
