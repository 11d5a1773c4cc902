use thiserror::Error;
use tracing::{debug, warn};

use super::hub::HubHandle;
use super::message::{ChatMessage, ConnectionIdentity, InboundFrame};
use super::outbound::OutboundReceiver;
use super::registry::ConnectionId;
use super::socket::{ChatSocket, SocketError};

/// Why a connection stopped
#[derive(Debug, Error)]
pub enum ConnectionExit {
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("connection released by the hub")]
    Released,
    #[error("failed to decode inbound frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(#[from] SocketError),
    #[error("chat hub is not running")]
    HubUnavailable,
}

/// Unregisters the connection when dropped, whichever way the connection
/// task ends (including cancellation).
pub(crate) struct RegistrationGuard {
    id: ConnectionId,
    hub: HubHandle,
}

impl RegistrationGuard {
    pub(crate) fn new(id: ConnectionId, hub: HubHandle) -> Self {
        Self { id, hub }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        debug!(connection_id = %self.id, "Signalling unregister");
        self.hub.unregister_detached(self.id);
    }
}

/// One registered connection.
///
/// Reads inbound frames and submits them to the hub, and writes whatever the
/// hub queued for it. It is the only writer on its socket.
pub(crate) struct Connection {
    identity: ConnectionIdentity,
    socket: Box<dyn ChatSocket>,
    outbound: OutboundReceiver,
    guard: RegistrationGuard,
    hub: HubHandle,
}

impl Connection {
    pub(crate) fn new(
        identity: ConnectionIdentity,
        socket: Box<dyn ChatSocket>,
        outbound: OutboundReceiver,
        guard: RegistrationGuard,
        hub: HubHandle,
    ) -> Self {
        Self {
            identity,
            socket,
            outbound,
            guard,
            hub,
        }
    }

    /// Run until the peer goes away, a frame fails to decode, or the hub
    /// releases this connection
    pub(crate) async fn run(mut self) -> ConnectionExit {
        let exit = loop {
            tokio::select! {
                // Hub -> peer
                queued = self.outbound.recv() => {
                    match queued {
                        Some(message) => {
                            if let Err(e) = self.deliver(&message).await {
                                break ConnectionExit::Transport(e);
                            }
                        }
                        None => break ConnectionExit::Released,
                    }
                }

                // Peer -> hub
                inbound = self.socket.receive_frame() => {
                    match inbound {
                        Ok(Some(payload)) => {
                            if let Err(exit) = self.submit(&payload).await {
                                break exit;
                            }
                        }
                        Ok(None) => break ConnectionExit::PeerClosed,
                        Err(e) => break ConnectionExit::Transport(e),
                    }
                }
            }
        };

        let Connection {
            mut socket,
            outbound,
            guard,
            ..
        } = self;

        let id = guard.id;
        outbound.close();
        drop(guard);
        if let Err(e) = socket.close().await {
            debug!(connection_id = %id, error = %e, "Socket already closed");
        }
        exit
    }

    async fn deliver(&mut self, message: &ChatMessage) -> Result<(), SocketError> {
        let frame = match serde_json::to_string(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode chat message, skipping");
                return Ok(());
            }
        };
        self.socket.send_text(frame).await
    }

    async fn submit(&mut self, payload: &[u8]) -> Result<(), ConnectionExit> {
        let frame = InboundFrame::decode(payload).map_err(|e| {
            warn!(
                event_id = self.identity.event_id,
                user_id = self.identity.user_id,
                error = %e,
                "Failed to parse chat frame"
            );
            ConnectionExit::Decode(e)
        })?;

        let message = ChatMessage::stamped(&self.identity, frame.content, self.hub.clock().now());
        self.hub
            .broadcast(message)
            .await
            .map_err(|_| ConnectionExit::HubUnavailable)
    }
}
