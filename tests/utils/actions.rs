//! Things a test peer does to the hub
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::json;

use event_chat_hub::{ChatMessage, HubStats};

use super::setup::TestSetup;

impl TestSetup {
    pub fn send_chat(&self, username: &str, content: &str) {
        self.peer(username)
            .send_raw(&json!({ "content": content }).to_string());
    }

    /// Sends a frame that also claims a different identity
    pub fn send_spoofed(&self, username: &str, content: &str) {
        self.peer(username).send_raw(
            &json!({
                "content": content,
                "userId": 999,
                "username": "mallory",
                "eventId": 12345,
                "timestamp": "1999-01-01T00:00:00Z",
            })
            .to_string(),
        );
    }

    pub fn send_garbage(&self, username: &str) {
        self.peer(username).send_raw("{not json");
    }

    pub fn hang_up(&self, username: &str) {
        self.peer(username).hang_up();
    }

    /// Broadcasts straight through the hub, as if from a peer outside the test
    pub async fn announce(&self, event_id: i64, content: &str) {
        let message = ChatMessage {
            event_id,
            user_id: 0,
            username: "host".to_string(),
            content: content.to_string(),
            timestamp: "2023-11-14T22:13:20Z".to_string(),
        };
        self.hub.broadcast(message).await.unwrap();
    }

    /// Round trip through the hub so every earlier command has been handled
    pub async fn settle(&self) -> HubStats {
        self.hub.stats().await.unwrap()
    }
}
