//! TCP server for ping protocol sessions.
//!
//! Binds the listening socket, accepts connections, and runs each session
//! on its own task so a slow or stalled peer never holds up the accept loop.
//! A session reports nothing back except its outcome, which is logged.

use crate::config::Config;
use crate::connection::{LineConnection, LineLimits};
use crate::protocols::ping::handle_connection;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Server instance
pub struct Server {
    listener: TcpListener,
    limits: LineLimits,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Resolve the configured address and start listening on it.
    pub async fn bind(config: &Config) -> io::Result<Self> {
        let addr = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no address found for {}", config.address()),
                )
            })?;

        let listener = TcpListener::from_std(create_listener(addr, config.backlog)?)?;
        info!(
            address = %listener.local_addr()?,
            max_connections = config.max_connections,
            "Server listening"
        );

        Ok(Server {
            listener,
            limits: config.limits,
            connection_limit: Arc::new(Semaphore::new(config.max_connections.max(1))),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. Errors on individual connections are
    /// logged and never stop the loop.
    pub async fn run(&self) -> io::Result<()> {
        loop {
            // Wait for a session slot
            let permit = self
                .connection_limit
                .clone()
                .acquire_owned()
                .await
                .map_err(io::Error::other)?;

            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "Client connected");
                    let limits = self.limits;

                    tokio::spawn(async move {
                        serve(stream, peer, limits).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Run the accept loop until Ctrl-C.
    pub async fn run_until_ctrl_c(&self) -> io::Result<()> {
        tokio::select! {
            result = self.run() => result,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutting down");
                Ok(())
            }
        }
    }
}

/// Run one session to completion and log how it ended.
async fn serve(stream: TcpStream, peer: SocketAddr, limits: LineLimits) {
    match handle_connection(LineConnection::new(stream, limits)).await {
        Ok(report) => info!(
            %peer,
            exchanges = report.exchanges,
            reason = %report.end,
            "Client disconnected"
        ),
        Err(e) => warn!(%peer, error = %e, "Client disconnected on transport error"),
    }
}

fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
