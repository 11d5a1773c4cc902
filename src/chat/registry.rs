use std::collections::HashMap;

use uuid::Uuid;

use super::message::{ConnectionIdentity, EventId};
use super::outbound::OutboundQueue;

/// Unique id of one live connection
pub type ConnectionId = Uuid;

/// A live connection as the hub sees it
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: ConnectionId,
    pub identity: ConnectionIdentity,
    pub outbound: OutboundQueue,
}

impl Registration {
    pub fn new(identity: ConnectionIdentity, outbound: OutboundQueue) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            outbound,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.identity.event_id
    }
}

/// Registered connections grouped by room, in registration order
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<EventId, Vec<Registration>>,
    index: HashMap<ConnectionId, EventId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. Returns `false` if the id is already registered.
    pub fn insert(&mut self, registration: Registration) -> bool {
        if self.contains(registration.id) {
            return false;
        }
        self.index.insert(registration.id, registration.event_id());
        self.rooms
            .entry(registration.event_id())
            .or_default()
            .push(registration);
        true
    }

    /// Removes a connection, returning it if it was registered
    pub fn remove(&mut self, id: ConnectionId) -> Option<Registration> {
        let event_id = self.index.remove(&id)?;
        let members = self.rooms.get_mut(&event_id)?;
        let position = members.iter().position(|r| r.id == id)?;
        let registration = members.remove(position);
        if members.is_empty() {
            self.rooms.remove(&event_id);
        }
        Some(registration)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Connections registered for a room
    pub fn members(&self, event_id: EventId) -> &[Registration] {
        self.rooms.get(&event_id).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Removes every connection
    pub fn drain(&mut self) -> Vec<Registration> {
        self.index.clear();
        self.rooms.drain().flat_map(|(_, members)| members).collect()
    }
}
