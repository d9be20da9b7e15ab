//! Configuration module for pingline.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::connection::LineLimits;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "pingline")]
#[command(author = "pingline authors")]
#[command(version = "0.1.0")]
#[command(about = "A newline-delimited PING/PONG server and client", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub role: RoleArgs,
}

#[derive(Subcommand, Debug)]
pub enum RoleArgs {
    /// Accept connections and answer each PING with PONG
    Server(ServerArgs),
    /// Connect to a server and send commands typed on stdin
    Client(ClientArgs),
}

/// Options shared by both roles
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Host to bind to (server) or connect to (client)
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum line length in bytes, delimiter included (0 = unlimited)
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Seconds to wait for a complete line (0 = no timeout)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Seconds to wait for a reply to be written (0 = no timeout)
    #[arg(long)]
    pub write_timeout: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Maximum number of concurrent sessions
    #[arg(short = 'n', long)]
    pub max_connections: Option<usize>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,
}

#[derive(Args, Debug, Default)]
pub struct ClientArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent sessions
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            backlog: default_backlog(),
        }
    }
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Server host to connect to
    #[serde(default = "default_client_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_client_host(),
            port: default_port(),
        }
    }
}

/// Line transport limits. Absent or zero means unlimited.
#[derive(Debug, Deserialize, Default)]
pub struct TransportConfig {
    pub max_line_length: Option<usize>,
    pub read_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_client_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    54321
}

fn default_max_connections() -> usize {
    1024
}

fn default_backlog() -> i32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which side of the protocol this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub backlog: i32,
    pub limits: LineLimits,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments, reading the TOML file they name.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let TomlConfig {
            server,
            client,
            transport,
            logging,
        } = toml_config;

        let mut max_connections = server.max_connections;
        let mut backlog = server.backlog;

        let (role, connection, host, port) = match cli.role {
            RoleArgs::Server(args) => {
                max_connections = args.max_connections.unwrap_or(max_connections);
                backlog = args.backlog.unwrap_or(backlog);
                (Role::Server, args.connection, server.host, server.port)
            }
            RoleArgs::Client(args) => (Role::Client, args.connection, client.host, client.port),
        };

        let limits = LineLimits {
            max_line_length: connection
                .max_line_length
                .or(transport.max_line_length)
                .filter(|&n| n > 0),
            read_timeout: seconds(connection.read_timeout.or(transport.read_timeout_secs)),
            write_timeout: seconds(connection.write_timeout.or(transport.write_timeout_secs)),
        };

        Config {
            role,
            host: connection.host.unwrap_or(host),
            port: connection.port.unwrap_or(port),
            max_connections,
            backlog,
            limits,
            log_level: cli.log_level.unwrap_or(logging.level),
        }
    }

    /// `host:port` for display.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn seconds(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|&s| s > 0).map(Duration::from_secs)
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
