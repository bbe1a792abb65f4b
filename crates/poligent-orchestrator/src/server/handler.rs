//! Per-connection handler
//!
//! Runs the open handshake with a peer, reports it to the orchestrator, then
//! multiplexes management requests onto the connection until either side
//! closes it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use poligent_core::error::ConnectionError;
use poligent_core::{ConnectionId, ManagementClient, PeerId, PeerIdentity, ProcessIdentity};
use poligent_protocol::{product_of, CorrelationId, Frame, JsonLinesCodec};

use crate::server::channel::{ManagementChannel, ManagementReply, PeerCommand};

/// Queued management requests per connection
const COMMAND_BUFFER: usize = 64;

/// Events emitted by connection handlers
pub enum PeerEvent {
    /// A peer completed the open handshake
    Connected {
        identity: PeerIdentity,
        connection_id: ConnectionId,
        /// Handle for issuing management requests on this connection
        client: Arc<dyn ManagementClient>,
    },
    /// A peer's connection closed
    Disconnected {
        peer_id: PeerId,
        connection_id: ConnectionId,
    },
}

/// Settings shared by every connection
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Identity advertised in our `open` frame
    pub identity: ProcessIdentity,
    /// Entity type of managed units
    pub entity_type: String,
    /// Timeout for one management request
    pub request_timeout: Duration,
    /// How long a peer may take to send its `open`
    pub handshake_timeout: Duration,
}

/// Serve one peer connection until it closes or `cancel` fires
pub async fn serve_connection<S>(
    stream: S,
    connection_id: ConnectionId,
    settings: Arc<ConnectionSettings>,
    event_tx: mpsc::Sender<PeerEvent>,
    cancel: CancellationToken,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, JsonLinesCodec::new());

    let identity = match tokio::time::timeout(settings.handshake_timeout, framed.next()).await {
        Err(_) => return Err(ConnectionError::HandshakeTimeout(settings.handshake_timeout)),
        Ok(None) => return Err(ConnectionError::ClosedBeforeOpen),
        Ok(Some(Err(e))) => return Err(e.into()),
        Ok(Some(Ok(Frame::Open {
            container_id,
            properties,
        }))) => PeerIdentity::new(container_id, product_of(&properties).map(str::to_string)),
        Ok(Some(Ok(other))) => return Err(ConnectionError::UnexpectedFrame(other.kind())),
    };

    framed.send(settings.identity.open_frame()).await?;

    tracing::info!(
        "{} opened by {} (product: {:?})",
        connection_id,
        identity.container_id,
        identity.product
    );

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let client = Arc::new(ManagementChannel::new(
        command_tx,
        settings.entity_type.clone(),
        settings.request_timeout,
    ));

    let peer_id = identity.peer_id();
    if event_tx
        .send(PeerEvent::Connected {
            identity,
            connection_id,
            client,
        })
        .await
        .is_err()
    {
        tracing::debug!("Event receiver gone, dropping {}", connection_id);
        return Ok(());
    }

    let result = run_session(&mut framed, command_rx, &peer_id, cancel).await;

    let _ = event_tx
        .send(PeerEvent::Disconnected {
            peer_id,
            connection_id,
        })
        .await;

    result
}

/// Forward requests out and route responses back until the connection ends
async fn run_session<S>(
    framed: &mut Framed<S, JsonLinesCodec>,
    mut command_rx: mpsc::Receiver<PeerCommand>,
    peer_id: &PeerId,
    cancel: CancellationToken,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut pending: HashMap<CorrelationId, oneshot::Sender<ManagementReply>> = HashMap::new();
    let mut next_id = CorrelationId::new(1);
    // Peers that are never registered drop their client; keep reading anyway
    let mut commands_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = framed
                    .send(Frame::Close {
                        description: Some("shutting down".to_string()),
                    })
                    .await;
                return Ok(());
            }

            command = command_rx.recv(), if commands_open => {
                let Some(PeerCommand { request, reply }) = command else {
                    commands_open = false;
                    continue;
                };

                let correlation_id = next_id;
                next_id = next_id.next();
                tracing::trace!(
                    "Sending {} {} {:?} to {}",
                    correlation_id,
                    request.operation,
                    request.name,
                    peer_id
                );

                framed.send(request.into_frame(correlation_id)).await?;
                // Requests whose caller timed out are no longer waited on
                pending.retain(|_, tx| !tx.is_closed());
                pending.insert(correlation_id, reply);
            }

            frame = framed.next() => {
                match frame {
                    Some(Ok(Frame::Response {
                        correlation_id,
                        status_code,
                        status_description,
                        body,
                    })) => match pending.remove(&correlation_id) {
                        Some(reply) => {
                            let _ = reply.send(ManagementReply {
                                status_code,
                                status_description,
                                body,
                            });
                        }
                        None => {
                            tracing::debug!(
                                "Discarding response {} from {}: no request waiting",
                                correlation_id,
                                peer_id
                            );
                        }
                    },
                    Some(Ok(Frame::Close { description })) => {
                        tracing::debug!("{} closed the connection: {:?}", peer_id, description);
                        return Ok(());
                    }
                    Some(Ok(other)) => {
                        tracing::warn!("Unexpected {} frame from {}", other.kind(), peer_id);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
        }
    }
}
