//! Peer listener
//!
//! Accepts incoming router connections and spawns a handler for each.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use poligent_core::ConnectionId;

use crate::server::handler::{serve_connection, ConnectionSettings, PeerEvent};

/// TCP listener for router peers
pub struct PeerListener {
    /// Settings handed to every connection
    settings: Arc<ConnectionSettings>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
    /// Event sender for peer events
    event_tx: mpsc::Sender<PeerEvent>,
    next_connection: AtomicU64,
}

impl PeerListener {
    /// Create a new listener
    pub fn new(
        settings: ConnectionSettings,
        cancel: CancellationToken,
        event_tx: mpsc::Sender<PeerEvent>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            cancel,
            event_tx,
            next_connection: AtomicU64::new(1),
        }
    }

    /// Bind `bind_addr` and accept peers until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;

        self.serve(listener).await
    }

    /// Accept peers on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening for routers on {}", local_addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Peer listener shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            self.handle_connection(socket, peer_addr);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let connection_id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        tracing::info!("New connection from {} ({})", peer_addr, connection_id);

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        let settings = Arc::clone(&self.settings);
        let event_tx = self.event_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            match serve_connection(socket, connection_id, settings, event_tx, cancel).await {
                Ok(()) => {
                    tracing::info!("Connection from {} closed normally", peer_addr);
                }
                Err(e) => {
                    tracing::warn!("Connection from {} closed with error: {}", peer_addr, e);
                }
            }
        });
    }
}
