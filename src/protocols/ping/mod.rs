//! Ping protocol implementation.
//!
//! A strict liveness protocol over newline-delimited text:
//! - Client sends: `PING\n`
//! - Server responds: `PONG\n`
//!
//! Any other line is a protocol violation. The server answers it with
//! `ERROR: expected PING\n` and closes the connection without trying to
//! resynchronize. There is no escaping and no length prefix; `\n` is the
//! only framing.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  PING\n
//! Response: PONG\n
//!
//! Request:  HELLO\n
//! Response: ERROR: expected PING\n   (connection closed)
//! ```
//!
//! When a maximum line length is configured, a line that exceeds it gets
//! `ERROR: line too long\n` and the connection is closed the same way.

pub mod handler;
pub mod parser;

pub use handler::{handle_connection, SessionEnd, SessionReport};
