//! Interactive ping client.
//!
//! Reads one command per line from the console, sends it, waits for exactly
//! one reply line and reports it. Anything other than `PONG` ends the session:
//! this is a single-shot negotiation, not a recovery protocol.

use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::{LineConnection, Received, TransportError};
use crate::protocols::ping::parser::{interpret_reply, Reply, DELIMITER};

pub const PROMPT: &str = "Enter message (PING to get PONG, EXIT to quit): ";

/// Why the user side ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user typed `exit` (any case).
    UserRequested,
    /// Console input reached end of file.
    InputClosed,
}

/// How a client session ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    ExitRequested(ExitReason),
    /// The server closed the connection while a reply was awaited.
    StreamClosed,
    /// The server answered with something other than `PONG`.
    ServerReported(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("console error: {0}")]
    Console(#[source] io::Error),
}

/// Connect to the configured server.
pub async fn connect(config: &Config) -> io::Result<LineConnection<TcpStream>> {
    let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
    info!(server = %config.address(), "Connected");
    Ok(LineConnection::new(stream, config.limits))
}

/// Drive the prompt/send/receive loop until a terminal condition.
///
/// The connection is consumed and closed when this returns.
pub async fn run_interactive<S, I, O>(
    mut conn: LineConnection<S>,
    input: &mut I,
    output: &mut O,
) -> Result<ClientOutcome, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut line = Vec::new();

    loop {
        write_console(output, PROMPT).await?;

        line.clear();
        let n = input
            .read_until(DELIMITER, &mut line)
            .await
            .map_err(ClientError::Console)?;
        if n == 0 {
            write_console(output, "\nstdin closed, exiting\n").await?;
            return Ok(ClientOutcome::ExitRequested(ExitReason::InputClosed));
        }

        // Sent as typed; the console is not required to be UTF-8.
        let command = strip_line_ending(&line);
        if command.eq_ignore_ascii_case(b"exit") {
            write_console(output, "exiting by user request\n").await?;
            return Ok(ClientOutcome::ExitRequested(ExitReason::UserRequested));
        }

        let mut message = Vec::with_capacity(command.len() + 1);
        message.extend_from_slice(command);
        message.push(DELIMITER);
        conn.send(&message).await?;

        match conn.receive_line().await? {
            Received::Closed => {
                write_console(output, "server closed connection\n").await?;
                return Ok(ClientOutcome::StreamClosed);
            }
            Received::Line(reply) => match interpret_reply(&reply) {
                Reply::Pong => {
                    debug!("Received PONG");
                    write_console(output, "got PONG\n").await?;
                }
                Reply::Other(text) => {
                    write_console(output, &format!("server reported error: {text}\n")).await?;
                    return Ok(ClientOutcome::ServerReported(text));
                }
            },
        }
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

async fn write_console<O>(output: &mut O, text: &str) -> Result<(), ClientError>
where
    O: AsyncWrite + Unpin,
{
    output
        .write_all(text.as_bytes())
        .await
        .map_err(ClientError::Console)?;
    output.flush().await.map_err(ClientError::Console)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{LineLimits, Operation};
    use tokio_test::io::Builder;

    async fn run(
        mock: tokio_test::io::Mock,
        mut input: &[u8],
    ) -> (Result<ClientOutcome, ClientError>, String) {
        let mut output = Vec::new();
        let conn = LineConnection::new(mock, LineLimits::default());
        let result = run_interactive(conn, &mut input, &mut output).await;
        (result, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_pings_then_exit() {
        let mock = Builder::new()
            .write(b"PING\n")
            .read(b"PONG\n")
            .write(b"PING\n")
            .read(b"PO")
            .read(b"NG\n")
            .write(b"PING\n")
            .read(b"PONG\n")
            .build();

        let (result, output) = run(mock, b"PING\nPING\nPING\nexit\n").await;

        assert_eq!(
            result.unwrap(),
            ClientOutcome::ExitRequested(ExitReason::UserRequested)
        );
        assert_eq!(output.matches("got PONG").count(), 3);
        assert_eq!(output.matches(PROMPT).count(), 4);
        assert!(output.ends_with("exiting by user request\n"));
    }

    #[tokio::test]
    async fn test_exit_is_case_insensitive() {
        for input in [&b"EXIT\n"[..], b"Exit\r\n", b"exit"] {
            let (result, _) = run(Builder::new().build(), input).await;
            assert_eq!(
                result.unwrap(),
                ClientOutcome::ExitRequested(ExitReason::UserRequested)
            );
        }
    }

    #[tokio::test]
    async fn test_input_closed() {
        let (result, output) = run(Builder::new().build(), b"").await;

        assert_eq!(
            result.unwrap(),
            ClientOutcome::ExitRequested(ExitReason::InputClosed)
        );
        assert!(output.ends_with("stdin closed, exiting\n"));
    }

    #[tokio::test]
    async fn test_crlf_input_is_normalized() {
        let mock = Builder::new().write(b"PING\n").read(b"PONG\n").build();

        let (result, _) = run(mock, b"PING\r\nexit\n").await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_server_error_ends_session() {
        let mock = Builder::new()
            .write(b"HELLO\n")
            .read(b"ERROR: expected PING\n")
            .build();

        // The second line is never sent.
        let (result, output) = run(mock, b"HELLO\nPING\n").await;

        assert_eq!(
            result.unwrap(),
            ClientOutcome::ServerReported("ERROR: expected PING".to_string())
        );
        assert!(output.contains("server reported error: ERROR: expected PING\n"));
    }

    #[tokio::test]
    async fn test_stream_closed_while_awaiting_reply() {
        let mock = Builder::new().write(b"PING\n").read(b"PON").build();

        let (result, output) = run(mock, b"PING\n").await;

        assert_eq!(result.unwrap(), ClientOutcome::StreamClosed);
        assert!(output.ends_with("server closed connection\n"));
    }

    #[tokio::test]
    async fn test_send_failure_is_an_error() {
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        let (result, _) = run(mock, b"PING\n").await;

        match result {
            Err(ClientError::Transport(TransportError::Io { op, .. })) => {
                assert_eq!(op, Operation::Write)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receive_failure_is_an_error() {
        let mock = Builder::new()
            .write(b"PING\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let (result, _) = run(mock, b"PING\n").await;

        match result {
            Err(ClientError::Transport(TransportError::Io { op, .. })) => {
                assert_eq!(op, Operation::Read)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_utf8_input_is_sent_as_is() {
        let mock = Builder::new()
            .write(b"caf\xe9\n")
            .read(b"ERROR: expected PING\n")
            .build();

        let (result, _) = run(mock, b"caf\xe9\n").await;

        assert_eq!(
            result.unwrap(),
            ClientOutcome::ServerReported("ERROR: expected PING".to_string())
        );
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"PING\n"), b"PING");
        assert_eq!(strip_line_ending(b"PING\r\n"), b"PING");
        assert_eq!(strip_line_ending(b"PING"), b"PING");
        assert_eq!(strip_line_ending(b"\n"), b"");
    }
}
