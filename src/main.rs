//! pingline: PING/PONG liveness server and interactive client
//!
//! - `pingline server` listens for connections and answers `PING` with `PONG`
//! - `pingline client` connects and sends commands typed on stdin
//!
//! Configuration via CLI arguments or TOML file.

use pingline::client::{self, ClientOutcome};
use pingline::config::{Config, Role};
use pingline::server::Server;
use std::process::ExitCode;
use tokio::io::BufReader;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.role {
        Role::Server => subscriber.init(),
        // stdout belongs to the prompt
        Role::Client => subscriber.with_writer(std::io::stderr).init(),
    }

    info!(
        role = ?config.role,
        address = %config.address(),
        max_line_length = ?config.limits.max_line_length,
        read_timeout = ?config.limits.read_timeout,
        write_timeout = ?config.limits.write_timeout,
        "Starting pingline"
    );

    let result = match config.role {
        Role::Server => run_server(config).await,
        Role::Client => run_client(config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Fatal");
            ExitCode::FAILURE
        }
    }
}

/// Serve until Ctrl-C
async fn run_server(config: Config) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let server = Server::bind(&config).await?;
    server.run_until_ctrl_c().await?;
    Ok(ExitCode::SUCCESS)
}

/// Run one interactive session against the configured server
async fn run_client(config: Config) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let conn = client::connect(&config)
        .await
        .map_err(|e| format!("connect to {}: {e}", config.address()))?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    match client::run_interactive(conn, &mut stdin, &mut stdout).await {
        // A server-reported error ends the exchange as the protocol intends.
        Ok(outcome @ ClientOutcome::ServerReported(_)) => {
            info!(?outcome, "Session ended by server");
            Ok(ExitCode::SUCCESS)
        }
        Ok(outcome) => {
            debug!(?outcome, "Session ended");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Client session failed");
            Ok(ExitCode::FAILURE)
        }
    }
}
