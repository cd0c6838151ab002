//! Server network layer: TCP listener, bounded worker pool and coordinator startup

use crate::game::{GameCommand, GameState};
use crate::session::handle_connection;
use log::{debug, error, info, warn};
use shared::{CLAIM_DWELL, DEFAULT_PORT};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// Connections served at once when nothing else is configured.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Runtime settings for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// How long a lone team must hold a cell before it is claimed.
    pub claim_dwell: Duration,
    /// Size of the worker pool. Further connections wait for a free worker.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            claim_dwell: CLAIM_DWELL,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Bound listener plus the game coordinator it feeds.
pub struct Server {
    listener: TcpListener,
    workers: Arc<Semaphore>,
    commands: mpsc::UnboundedSender<GameCommand>,
    coordinator: JoinHandle<()>,
}

impl Server {
    /// Bind the listener and start the coordinator.
    pub async fn bind(config: ServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!(
            "Server listening on {} ({} workers)",
            listener.local_addr()?,
            config.max_connections
        );

        let (commands, coordinator) = GameState::spawn(config.claim_dwell);

        Ok(Server {
            listener,
            workers: Arc::new(Semaphore::new(config.max_connections.max(1))),
            commands,
            coordinator,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one worker task per connection.
    pub async fn run(self) -> std::io::Result<()> {
        info!("Server started successfully");

        loop {
            // Wait for a free worker before taking the next connection.
            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
            }
            debug!("Accepted connection from {}", peer);

            let commands = self.commands.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, commands).await {
                    warn!("Connection {} ended with error: {}", peer, e);
                }
                drop(permit);
            });
        }

        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.coordinator.abort();
    }
}
