//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::time::Duration;

use event_chat_hub::ChatMessage;

use super::mocks::MockPeer;
use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct MessageAssertion<'a> {
    peer: &'a mut MockPeer,
    username: String,
}

impl<'a> MessageAssertion<'a> {
    pub fn for_peer(setup: &'a mut TestSetup, username: &str) -> Self {
        let peer = setup
            .peers
            .get_mut(username)
            .unwrap_or_else(|| panic!("{} is not connected", username));
        Self {
            peer,
            username: username.to_string(),
        }
    }

    /// Assert the next messages written to the peer carry these contents, in
    /// order (consumes them)
    pub async fn received(mut self, expected: &[&str]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(expected.len());
        for want in expected {
            let message = self
                .next()
                .await
                .unwrap_or_else(|| panic!("{} should have received {:?}", self.username, want));
            assert_eq!(
                message.content, *want,
                "{} received messages out of order",
                self.username
            );
            messages.push(message);
        }
        messages
    }

    /// Assert nothing more is written to the peer
    pub async fn received_nothing(self) {
        let extra =
            tokio::time::timeout(Duration::from_millis(100), self.peer.written.recv()).await;
        if let Ok(Some(frame)) = extra {
            panic!("{} should not have received {}", self.username, frame);
        }
    }

    async fn next(&mut self) -> Option<ChatMessage> {
        let frame = tokio::time::timeout(Duration::from_secs(1), self.peer.written.recv())
            .await
            .ok()??;
        Some(serde_json::from_str(&frame).expect("outbound frame should be a chat message"))
    }
}
