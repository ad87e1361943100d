//! Intercom server listener
//!
//! Handles TCP accept loop and spawns connection sessions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

use crate::error::{Error, Result};
use crate::relay::BroadcastHub;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::{ServerMetrics, ServerStats};

/// Intercom relay server
pub struct IntercomServer {
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    metrics: Arc<ServerMetrics>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown_tx: watch::Sender<bool>,
}

impl IntercomServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            hub: Arc::new(BroadcastHub::new(config.relay.clone())),
            config,
            metrics: Arc::new(ServerMetrics::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown_tx,
        }
    }

    /// Get a reference to the broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Current server statistics
    pub fn stats(&self) -> ServerStats {
        self.metrics.snapshot()
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| Error::Config(format!("cannot bind {}: {}", self.config.bind_addr, e)))?;
        tracing::info!(addr = %listener.local_addr()?, "Intercom server listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        // Cancel every running session
        self.shutdown_tx.send_replace(true);

        let stats = self.metrics.snapshot();
        tracing::info!(
            total_connections = stats.total_connections,
            frames_relayed = stats.frames_relayed,
            publishes_rejected = stats.publishes_rejected,
            "Server stopped"
        );

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit lives as long as the session
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        // Generate session ID
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let config = self.config.clone();
        let hub = Arc::clone(&self.hub);
        let metrics = Arc::clone(&self.metrics);
        let shutdown = self.shutdown_tx.subscribe();

        metrics.connection_opened();

        tokio::spawn(async move {
            let _permit = permit;
            let connection = Connection::new(session_id, socket, peer_addr, config, hub, shutdown);

            let (stats, result) = connection.run().await;
            metrics.record_session(&stats);
            tracing::debug!(
                session_id = session_id,
                images_received = stats.images_received,
                images_rejected = stats.images_rejected,
                images_relayed = stats.images_relayed,
                audio_relayed = stats.audio_relayed,
                inbound_bps = stats.inbound_bitrate(),
                duration_ms = stats.duration.as_millis() as u64,
                "Connection closed"
            );
            if let Err(e) = result {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            metrics.connection_closed();
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
