use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use event_chat_hub::{
    chat::FixedClock, BackpressurePolicy, ConnectionExit, ConnectionIdentity, HistoryRetention,
    Hub, HubConfig, HubHandle,
};

use super::mocks::{mock_pair, MockPeer};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// 2023-11-14T22:13:20Z
pub const FIXED_TIME: i64 = 1_700_000_000;

pub struct TestSetup {
    pub hub: HubHandle,
    pub peers: HashMap<String, MockPeer>,
    pub tasks: HashMap<String, JoinHandle<ConnectionExit>>,
    user_ids: HashMap<String, i64>,
}

pub struct TestSetupBuilder {
    config: HubConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: HubConfig::default(),
        }
    }

    pub fn with_retention(mut self, retention: HistoryRetention) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn with_backpressure(mut self, capacity: usize, policy: BackpressurePolicy) -> Self {
        self.config.outbound_capacity = capacity;
        self.config.backpressure = policy;
        self
    }

    pub fn build(self) -> TestSetup {
        let clock = Arc::new(FixedClock::new(Utc.timestamp_opt(FIXED_TIME, 0).unwrap()));
        let (hub, _task) = Hub::spawn(self.config, clock);

        TestSetup {
            hub,
            peers: HashMap::new(),
            tasks: HashMap::new(),
            user_ids: HashMap::new(),
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSetup {
    /// Connects `username` to a room and waits until the hub has registered it
    pub async fn connect(&mut self, username: &str, event_id: i64) {
        self.attach(username, event_id, false).await;
    }

    /// Like `connect`, but the peer is not reading, so the first write blocks
    pub async fn connect_paused(&mut self, username: &str, event_id: i64) {
        self.attach(username, event_id, true).await;
    }

    async fn attach(&mut self, username: &str, event_id: i64, paused: bool) {
        let user_id = self.user_id(username);
        let before = self.hub.stats().await.unwrap().connections;

        let (socket, peer) = mock_pair();
        if paused {
            peer.pause_reading();
        }
        let hub = self.hub.clone();
        let identity = ConnectionIdentity::new(event_id, user_id, username);
        let task = tokio::spawn(async move { hub.accept(socket, identity).await });

        self.peers.insert(username.to_string(), peer);
        self.tasks.insert(username.to_string(), task);
        self.wait_for_connections(before + 1).await;
    }

    pub fn peer(&self, username: &str) -> &MockPeer {
        self.peers
            .get(username)
            .unwrap_or_else(|| panic!("{} is not connected", username))
    }

    pub fn user_id(&mut self, username: &str) -> i64 {
        let next = self.user_ids.len() as i64 + 1;
        *self.user_ids.entry(username.to_string()).or_insert(next)
    }

    pub async fn wait_for_connections(&self, expected: usize) {
        for _ in 0..100 {
            if self.hub.stats().await.unwrap().connections == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("hub never reached {} connections", expected);
    }

    /// Waits for a connection task to end and returns why it ended
    pub async fn exit_of(&mut self, username: &str) -> ConnectionExit {
        let task = self
            .tasks
            .remove(username)
            .unwrap_or_else(|| panic!("{} has no connection task", username));
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("connection task should finish")
            .expect("connection task should not panic")
    }
}
