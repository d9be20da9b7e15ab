use std::time::Duration;

use pingline::client::{self, ClientOutcome, ExitReason};
use pingline::config::{Config, Role};
use pingline::connection::{LineConnection, LineLimits, Received};
use pingline::protocols::ping::{handle_connection, SessionEnd, SessionReport};
use pingline::server::Server;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn config(role: Role, port: u16) -> Config {
    Config {
        role,
        host: "127.0.0.1".to_string(),
        port,
        max_connections: 8,
        backlog: 5,
        limits: LineLimits::default(),
        log_level: "info".to_string(),
    }
}

#[tokio::test]
async fn three_pings_then_exit() {
    let (client_side, server_side) = tokio::io::duplex(64);
    let server = tokio::spawn(handle_connection(LineConnection::new(
        server_side,
        LineLimits::default(),
    )));

    let mut input: &[u8] = b"PING\nPING\nPING\nexit\n";
    let mut output = Vec::new();
    let conn = LineConnection::new(client_side, LineLimits::default());
    let outcome = timeout(
        TEST_TIMEOUT,
        client::run_interactive(conn, &mut input, &mut output),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome, ClientOutcome::ExitRequested(ExitReason::UserRequested));

    // The client dropped its end, so the server sees a clean close.
    let report = timeout(TEST_TIMEOUT, server).await.unwrap().unwrap().unwrap();
    assert_eq!(
        report,
        SessionReport {
            exchanges: 3,
            end: SessionEnd::PeerClosed,
        }
    );
}

#[tokio::test]
async fn hello_is_rejected() {
    let (client_side, server_side) = tokio::io::duplex(64);
    let server = tokio::spawn(handle_connection(LineConnection::new(
        server_side,
        LineLimits::default(),
    )));

    let mut input: &[u8] = b"HELLO\n";
    let mut output = Vec::new();
    let conn = LineConnection::new(client_side, LineLimits::default());
    let outcome = timeout(
        TEST_TIMEOUT,
        client::run_interactive(conn, &mut input, &mut output),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(
        outcome,
        ClientOutcome::ServerReported("ERROR: expected PING".to_string())
    );
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("server reported error: ERROR: expected PING"));

    let report = timeout(TEST_TIMEOUT, server).await.unwrap().unwrap().unwrap();
    assert_eq!(report.exchanges, 0);
    assert!(matches!(report.end, SessionEnd::ProtocolViolation { .. }));
}

#[tokio::test]
async fn server_closes_right_after_error_reply() {
    let (client_side, server_side) = tokio::io::duplex(64);
    tokio::spawn(handle_connection(LineConnection::new(
        server_side,
        LineLimits::default(),
    )));

    let mut conn = LineConnection::new(client_side, LineLimits::default());
    conn.send(b"PING\n").await.unwrap();
    assert_eq!(
        conn.receive_line().await.unwrap(),
        Received::Line("PONG\n".into())
    );

    conn.send(b"HELLO\n").await.unwrap();
    assert_eq!(
        conn.receive_line().await.unwrap(),
        Received::Line("ERROR: expected PING\n".into())
    );
    let after = timeout(TEST_TIMEOUT, conn.receive_line()).await.unwrap();
    assert_eq!(after.unwrap(), Received::Closed);
}

#[tokio::test]
async fn client_against_tcp_server() {
    let server = Server::bind(&config(Role::Server, 0)).await.unwrap();
    let port = server.local_addr().unwrap().port();
    tokio::spawn(async move { server.run().await });

    let conn = client::connect(&config(Role::Client, port)).await.unwrap();
    let mut input: &[u8] = b"PING\nPING\nPING\nEXIT\n";
    let mut output = Vec::new();

    let outcome = timeout(
        TEST_TIMEOUT,
        client::run_interactive(conn, &mut input, &mut output),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome, ClientOutcome::ExitRequested(ExitReason::UserRequested));
    let output = String::from_utf8(output).unwrap();
    assert_eq!(output.matches("got PONG").count(), 3);
}

#[tokio::test]
async fn connect_refused_is_an_error() {
    // Grab a free port, then release it so nothing listens there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    assert!(client::connect(&config(Role::Client, port)).await.is_err());
}
