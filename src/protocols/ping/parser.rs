//! Ping protocol parser.

use std::borrow::Cow;

/// Line delimiter. The only framing on the wire.
pub const DELIMITER: u8 = b'\n';

/// The only command a client may send.
pub const PING: &[u8] = b"PING\n";

/// Reply to a valid `PING`.
pub const PONG: &[u8] = b"PONG\n";

/// Reason sent when a line is anything other than `PING\n`.
pub const REASON_EXPECTED_PING: &str = "expected PING";

/// Reason sent when a line exceeds the configured maximum length.
pub const REASON_LINE_TOO_LONG: &str = "line too long";

/// Parsed ping command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness probe.
    Ping,
}

/// Parse result.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// Line matched a command.
    Complete(Command),
    /// Protocol violation.
    Invalid,
}

/// Validate one received line, delimiter included.
///
/// Matching is exact and case-sensitive: `ping\n`, `PING\r\n` and
/// `PING extra\n` are all violations.
pub fn parse(line: &[u8]) -> ParseResult {
    if line == PING {
        ParseResult::Complete(Command::Ping)
    } else {
        ParseResult::Invalid
    }
}

/// Format a PONG response.
pub fn response_pong() -> &'static [u8] {
    PONG
}

/// Format an error response: `ERROR: <reason>\n`.
pub fn response_error(reason: &str) -> Vec<u8> {
    format!("ERROR: {reason}\n").into_bytes()
}

/// How the client reads a reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Pong,
    /// Anything else, delimiter stripped. Usually an `ERROR: ...` line.
    Other(String),
}

/// Interpret a reply line received by the client.
pub fn interpret_reply(line: &[u8]) -> Reply {
    if line == PONG {
        Reply::Pong
    } else {
        let body = line.strip_suffix(&[DELIMITER]).unwrap_or(line);
        Reply::Other(String::from_utf8_lossy(body).into_owned())
    }
}

/// Render a line for log output with the delimiter and other control
/// characters escaped.
pub fn printable(line: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(line);
    if text.chars().any(char::is_control) {
        Cow::Owned(text.escape_debug().to_string())
    } else {
        text
    }
}
