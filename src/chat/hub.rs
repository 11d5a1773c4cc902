//! The chat hub: a single coordinator task that owns the connection registry
//! and the room log.
//!
//! All mutation goes through [`HubHandle`], which sends commands to the
//! coordinator; the coordinator handles them strictly one at a time. It never
//! writes to a socket itself - delivery means pushing into a connection's
//! outbound queue - so a slow peer cannot stall the rest of the hub.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::clock::Clock;
use super::connection::{Connection, ConnectionExit, RegistrationGuard};
use super::message::{ChatMessage, ConnectionIdentity, EventId};
use super::outbound::{self, BackpressurePolicy, PushOutcome};
use super::registry::{ConnectionId, Registration, Registry};
use super::room_log::{HistoryRetention, RoomLog};
use super::socket::ChatSocket;

/// Configuration for the chat hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Live messages buffered per connection before backpressure applies
    pub outbound_capacity: usize,
    /// What happens when a connection's outbound queue is full
    pub backpressure: BackpressurePolicy,
    /// How much history each room keeps for replay
    pub retention: HistoryRetention,
    /// Commands buffered for the coordinator before callers wait
    pub command_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            backpressure: BackpressurePolicy::Disconnect,
            retention: HistoryRetention::Unbounded,
            command_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("chat hub is not running")]
    Unavailable,
}

/// Point-in-time counters reported by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub active_rooms: usize,
    pub logged_rooms: usize,
    pub logged_messages: usize,
}

enum HubCommand {
    Register {
        registration: Registration,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        id: ConnectionId,
    },
    Broadcast {
        message: ChatMessage,
    },
    History {
        event_id: EventId,
        reply: oneshot::Sender<Vec<ChatMessage>>,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// The coordinator. Construct with [`Hub::spawn`] (or [`Hub::new`] and drive
/// [`Hub::run`] yourself).
pub struct Hub {
    commands: mpsc::Receiver<HubCommand>,
    registry: Registry,
    log: RoomLog,
}

impl Hub {
    pub fn new(config: HubConfig, clock: Arc<dyn Clock>) -> (Self, HubHandle) {
        let (sender, receiver) = mpsc::channel(config.command_capacity.max(1));

        let hub = Self {
            commands: receiver,
            registry: Registry::new(),
            log: RoomLog::new(config.retention),
        };
        let handle = HubHandle {
            commands: sender,
            clock,
            outbound_capacity: config.outbound_capacity,
            backpressure: config.backpressure,
        };
        (hub, handle)
    }

    /// Starts the coordinator on the current runtime
    pub fn spawn(config: HubConfig, clock: Arc<dyn Clock>) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config, clock);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Processes commands until shutdown is requested or every handle is gone
    pub async fn run(mut self) {
        info!(retention = %self.log.retention(), "Chat hub started");

        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register { registration, ack } => {
                    self.register(registration);
                    let _ = ack.send(());
                }
                HubCommand::Unregister { id } => self.unregister(id),
                HubCommand::Broadcast { message } => self.broadcast(message),
                HubCommand::History { event_id, reply } => {
                    let history = self.log.replay(event_id).map(|m| (**m).clone()).collect();
                    let _ = reply.send(history);
                }
                HubCommand::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                HubCommand::Shutdown { ack } => {
                    self.commands.close();
                    self.release_all();
                    let _ = ack.send(());
                    break;
                }
            }
        }

        self.commands.close();
        self.release_all();
        info!("Chat hub stopped");
    }

    fn register(&mut self, registration: Registration) {
        let id = registration.id;
        let event_id = registration.event_id();
        let outbound = registration.outbound.clone();

        if !self.registry.insert(registration) {
            warn!(connection_id = %id, event_id, "Connection already registered");
            return;
        }

        // Replay goes to the new connection only
        match outbound.push_replay(self.log.replay(event_id)) {
            Ok(replayed) => debug!(connection_id = %id, event_id, replayed, "Replayed room history"),
            Err(e) => warn!(
                connection_id = %id,
                event_id,
                error = %e,
                "Failed to replay room history"
            ),
        }

        info!(
            connection_id = %id,
            event_id,
            connections = self.registry.len(),
            "Connection registered"
        );
    }

    fn unregister(&mut self, id: ConnectionId) {
        match self.registry.remove(id) {
            Some(registration) => {
                registration.outbound.close();
                info!(
                    connection_id = %id,
                    event_id = registration.event_id(),
                    connections = self.registry.len(),
                    "Connection unregistered"
                );
            }
            None => debug!(connection_id = %id, "Connection already unregistered"),
        }
    }

    fn broadcast(&mut self, message: ChatMessage) {
        let event_id = message.event_id;
        let message = Arc::new(message);
        self.log.append(message.clone());

        let mut failed = Vec::new();
        let mut delivered = 0usize;
        for member in self.registry.members(event_id) {
            match member.outbound.push(message.clone()) {
                Ok(PushOutcome::Queued) => delivered += 1,
                Ok(outcome) => {
                    delivered += 1;
                    warn!(
                        connection_id = %member.id,
                        event_id,
                        outcome = ?outcome,
                        "Outbound queue full, message dropped"
                    );
                }
                Err(e) => {
                    warn!(
                        connection_id = %member.id,
                        event_id,
                        error = %e,
                        "Delivery failed, dropping connection"
                    );
                    failed.push(member.id);
                }
            }
        }

        for id in failed {
            self.unregister(id);
        }

        debug!(
            event_id,
            user_id = message.user_id,
            delivered,
            "Broadcast chat message"
        );
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.registry.len(),
            active_rooms: self.registry.room_count(),
            logged_rooms: self.log.room_count(),
            logged_messages: self.log.message_count(),
        }
    }

    fn release_all(&mut self) {
        let released = self.registry.drain();
        if released.is_empty() {
            return;
        }
        for registration in &released {
            registration.outbound.close();
        }
        info!(released = released.len(), "Released all connections");
    }
}

/// Cloneable handle to a running hub
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    clock: Arc<dyn Clock>,
    outbound_capacity: usize,
    backpressure: BackpressurePolicy,
}

impl fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubHandle")
            .field("outbound_capacity", &self.outbound_capacity)
            .field("backpressure", &self.backpressure)
            .field("running", &!self.commands.is_closed())
            .finish()
    }
}

impl HubHandle {
    /// Hands an already-authenticated connection to the hub.
    ///
    /// Registers it (which replays the room history), then reads frames from
    /// it until the peer goes away, a frame fails to decode, or the hub
    /// releases it. Unregistration happens exactly once on every exit path.
    #[instrument(
        name = "chat_connection",
        skip(self, socket, identity),
        fields(event_id = identity.event_id, user_id = identity.user_id)
    )]
    pub async fn accept<S>(&self, socket: S, identity: ConnectionIdentity) -> ConnectionExit
    where
        S: ChatSocket + 'static,
    {
        let (queue, receiver) = outbound::channel(self.outbound_capacity, self.backpressure);
        let registration = Registration::new(identity.clone(), queue);
        let guard = RegistrationGuard::new(registration.id, self.clone());
        let mut socket: Box<dyn ChatSocket> = Box::new(socket);

        if let Err(e) = self.register(registration).await {
            warn!(error = %e, "Could not register connection");
            let _ = socket.close().await;
            return ConnectionExit::HubUnavailable;
        }

        let exit = Connection::new(identity, socket, receiver, guard, self.clone())
            .run()
            .await;

        match &exit {
            ConnectionExit::PeerClosed | ConnectionExit::Released => {
                info!(reason = %exit, "Chat connection closed")
            }
            _ => warn!(reason = %exit, "Chat connection terminated"),
        }
        exit
    }

    /// Adds a connection and replays its room history to it
    pub async fn register(&self, registration: Registration) -> Result<(), HubError> {
        let (ack, done) = oneshot::channel();
        self.send(HubCommand::Register { registration, ack }).await?;
        done.await.map_err(|_| HubError::Unavailable)
    }

    /// Removes a connection if it is still registered and releases it
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister { id }).await
    }

    /// Appends a message to its room log and delivers it to the room
    pub async fn broadcast(&self, message: ChatMessage) -> Result<(), HubError> {
        self.send(HubCommand::Broadcast { message }).await
    }

    /// Snapshot of a room's stored history, oldest first
    pub async fn history(&self, event_id: EventId) -> Result<Vec<ChatMessage>, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::History { event_id, reply }).await?;
        response.await.map_err(|_| HubError::Unavailable)
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await?;
        response.await.map_err(|_| HubError::Unavailable)
    }

    /// Releases every connection and stops the coordinator
    pub async fn shutdown(&self) -> Result<(), HubError> {
        let (ack, done) = oneshot::channel();
        self.send(HubCommand::Shutdown { ack }).await?;
        done.await.map_err(|_| HubError::Unavailable)
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Unregister without awaiting; used from drop paths
    pub(crate) fn unregister_detached(&self, id: ConnectionId) {
        match self.commands.try_send(HubCommand::Unregister { id }) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %id, "Hub stopped before unregister")
            }
            Err(TrySendError::Full(command)) => {
                let commands = self.commands.clone();
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(async move {
                            let _ = commands.send(command).await;
                        });
                    }
                    Err(_) => warn!(connection_id = %id, "No runtime to deliver unregister"),
                }
            }
        }
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Unavailable)
    }
}
