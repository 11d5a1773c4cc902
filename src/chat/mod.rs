// Real-time chat hub for event rooms
//
// A single coordinator task owns the connection registry and the per-room
// message log. Each connection runs its own task that reads frames from the
// peer and writes whatever the coordinator queued for it.

// Public API - what other modules can use
pub use clock::{Clock, FixedClock, SystemClock};
pub use connection::ConnectionExit;
pub use hub::{Hub, HubConfig, HubError, HubHandle, HubStats};
pub use message::{ChatMessage, ConnectionIdentity, EventId, InboundFrame, UserId};
pub use outbound::{BackpressurePolicy, OutboundQueue, OutboundReceiver, PushError, PushOutcome};
pub use registry::{ConnectionId, Registration};
pub use room_log::{HistoryRetention, RoomLog};
pub use socket::{ChatSocket, SocketError};

// Internal modules
mod clock;
mod connection;
mod hub;
mod message;
pub mod outbound;
mod registry;
mod room_log;
mod socket;
