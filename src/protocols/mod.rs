//! Protocol implementations.
//!
//! - `ping`: strict PING/PONG liveness protocol, one command per line
//!   (parser shared by server and client, session handler for the server)

pub mod ping;
