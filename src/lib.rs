//! pingline: a strict PING/PONG liveness protocol over TCP.
//!
//! A client sends newline-terminated commands, the server answers each with
//! one newline-terminated reply, and the exchange repeats until either side
//! closes the connection.
//!
//! - [`connection`] turns a fragmented byte stream into discrete lines and
//!   back, handling partial reads and writes, interruptions and peer close.
//! - [`protocols::ping`] holds the wire tokens and the server session.
//! - [`server`] accepts connections and runs one session task per client.
//! - [`client`] drives the interactive console session.
//! - [`config`] merges CLI arguments with an optional TOML file.

pub mod client;
pub mod config;
pub mod connection;
pub mod protocols;
pub mod server;
