//! Per-connection outbound queue between the hub and a connection task.
//!
//! The hub only ever pushes into the queue, never awaits a socket write, so a
//! slow peer cannot hold up anyone else. When the queue is full the
//! configured [`BackpressurePolicy`] decides what happens.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strum_macros::{Display, EnumString};
use thiserror::Error;
use tokio::sync::Notify;

use super::message::ChatMessage;

/// What to do when a peer's outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum BackpressurePolicy {
    /// Treat the overflow as a delivery failure and drop the peer
    #[default]
    Disconnect,
    /// Evict the oldest queued message to make room
    DropOldest,
    /// Discard the incoming message for this peer only
    DropNewest,
}

/// Result of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    DroppedOldest,
    DroppedNewest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound queue is closed")]
    Closed,
}

/// Replayed history is held apart from live traffic so that only live
/// messages count against the capacity, and overflow never evicts history.
#[derive(Debug, Default)]
struct State {
    replay: VecDeque<Arc<ChatMessage>>,
    live: VecDeque<Arc<ChatMessage>>,
    closed: bool,
}

impl State {
    fn pop(&mut self) -> Option<Arc<ChatMessage>> {
        self.replay.pop_front().or_else(|| self.live.pop_front())
    }

    fn len(&self) -> usize {
        self.replay.len() + self.live.len()
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) -> bool {
        let newly_closed = {
            let mut state = self.lock();
            let newly_closed = !state.closed;
            state.closed = true;
            state.replay.clear();
            state.live.clear();
            newly_closed
        };
        self.notify.notify_one();
        newly_closed
    }
}

/// Creates a queue holding at most `capacity` live messages.
pub fn channel(capacity: usize, policy: BackpressurePolicy) -> (OutboundQueue, OutboundReceiver) {
    let shared = Arc::new(Shared::default());
    (
        OutboundQueue {
            shared: shared.clone(),
            capacity: capacity.max(1),
            policy,
        },
        OutboundReceiver { shared },
    )
}

/// Producer side, held by the hub's registry
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    shared: Arc<Shared>,
    capacity: usize,
    policy: BackpressurePolicy,
}

impl OutboundQueue {
    /// Enqueues a live message, applying the backpressure policy when full
    pub fn push(&self, message: Arc<ChatMessage>) -> Result<PushOutcome, PushError> {
        let outcome = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(PushError::Closed);
            }

            if state.live.len() < self.capacity {
                state.live.push_back(message);
                PushOutcome::Queued
            } else {
                match self.policy {
                    BackpressurePolicy::Disconnect => return Err(PushError::Full),
                    BackpressurePolicy::DropNewest => return Ok(PushOutcome::DroppedNewest),
                    BackpressurePolicy::DropOldest => {
                        state.live.pop_front();
                        state.live.push_back(message);
                        PushOutcome::DroppedOldest
                    }
                }
            }
        };
        self.shared.notify.notify_one();
        Ok(outcome)
    }

    /// Enqueues room history ahead of any live traffic. Queued history does
    /// not count against the capacity; its size is bounded by the room log's
    /// retention.
    pub fn push_replay<'a, I>(&self, messages: I) -> Result<usize, PushError>
    where
        I: IntoIterator<Item = &'a Arc<ChatMessage>>,
    {
        let count = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(PushError::Closed);
            }
            let before = state.replay.len();
            state.replay.extend(messages.into_iter().cloned());
            state.replay.len() - before
        };
        if count > 0 {
            self.shared.notify.notify_one();
        }
        Ok(count)
    }

    /// Releases the queue. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.shared.close()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer side, owned by the connection task
#[derive(Debug)]
pub struct OutboundReceiver {
    shared: Arc<Shared>,
}

impl OutboundReceiver {
    /// Waits for the next message. Returns `None` once the queue is closed.
    ///
    /// Cancel safe: a message is only removed from the buffer when it is
    /// returned.
    pub async fn recv(&mut self) -> Option<Arc<ChatMessage>> {
        loop {
            {
                let mut state = self.shared.lock();
                if state.closed {
                    return None;
                }
                if let Some(message) = state.pop() {
                    return Some(message);
                }
            }
            self.shared.notify.notified().await;
        }
    }

    pub fn try_recv(&mut self) -> Option<Arc<ChatMessage>> {
        let mut state = self.shared.lock();
        if state.closed {
            return None;
        }
        state.pop()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn close(&self) -> bool {
        self.shared.close()
    }
}

impl Drop for OutboundReceiver {
    fn drop(&mut self) {
        self.shared.close();
    }
}
