use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::message::{ChatMessage, EventId};

/// How much history each room keeps for replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryRetention {
    /// Keep every message for the lifetime of the process
    #[default]
    Unbounded,
    /// Keep only the most recent `n` messages per room (0 disables history)
    Latest(usize),
}

impl fmt::Display for HistoryRetention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryRetention::Unbounded => write!(f, "unbounded"),
            HistoryRetention::Latest(n) => write!(f, "latest {}", n),
        }
    }
}

/// Append-only per-room message history.
///
/// Messages are kept in the order they were appended. With
/// [`HistoryRetention::Latest`] the oldest entries fall off the front, but
/// the remaining ones never change order.
#[derive(Debug, Default)]
pub struct RoomLog {
    retention: HistoryRetention,
    rooms: HashMap<EventId, VecDeque<Arc<ChatMessage>>>,
}

impl RoomLog {
    pub fn new(retention: HistoryRetention) -> Self {
        Self {
            retention,
            rooms: HashMap::new(),
        }
    }

    pub fn retention(&self) -> HistoryRetention {
        self.retention
    }

    /// Appends a message to its room, creating the room entry if needed.
    /// With history disabled nothing is stored and no entry is created.
    pub fn append(&mut self, message: Arc<ChatMessage>) {
        if self.retention == HistoryRetention::Latest(0) {
            return;
        }
        let history = self.rooms.entry(message.event_id).or_default();

        match self.retention {
            HistoryRetention::Unbounded => history.push_back(message),
            HistoryRetention::Latest(limit) => {
                while history.len() >= limit {
                    history.pop_front();
                }
                history.push_back(message);
            }
        }
    }

    /// Stored messages for a room, oldest first
    pub fn replay(&self, event_id: EventId) -> impl Iterator<Item = &Arc<ChatMessage>> + '_ {
        self.rooms.get(&event_id).into_iter().flatten()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn message_count(&self) -> usize {
        self.rooms.values().map(VecDeque::len).sum()
    }
}
