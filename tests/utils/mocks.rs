//! In-memory ChatSocket for driving the hub without a network
#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use event_chat_hub::chat::{ChatSocket, SocketError};

enum Frame {
    Payload(Vec<u8>),
    Broken,
    Close,
}

/// Server side, handed to `HubHandle::accept`
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<Frame>,
    written: mpsc::UnboundedSender<String>,
    closes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    paused: watch::Receiver<bool>,
    stalled: Arc<AtomicBool>,
}

/// Client side, kept by the test
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<Frame>,
    pub(crate) written: mpsc::UnboundedReceiver<String>,
    closes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    paused: watch::Sender<bool>,
    stalled: Arc<AtomicBool>,
}

pub fn mock_pair() -> (MockSocket, MockPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let (paused_tx, paused_rx) = watch::channel(false);
    let closes = Arc::new(AtomicUsize::new(0));
    let failing = Arc::new(AtomicBool::new(false));
    let stalled = Arc::new(AtomicBool::new(false));

    let socket = MockSocket {
        inbound: inbound_rx,
        written: written_tx,
        closes: Arc::clone(&closes),
        failing: Arc::clone(&failing),
        paused: paused_rx,
        stalled: Arc::clone(&stalled),
    };
    let peer = MockPeer {
        inbound: inbound_tx,
        written: written_rx,
        closes,
        failing,
        paused: paused_tx,
        stalled,
    };
    (socket, peer)
}

#[async_trait]
impl ChatSocket for MockSocket {
    async fn send_text(&mut self, frame: String) -> Result<(), SocketError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SocketError::SendFailed("peer stopped reading".to_string()));
        }

        let paused = *self.paused.borrow();
        if paused {
            self.stalled.store(true, Ordering::SeqCst);
            let resumed = self.paused.wait_for(|paused| !*paused).await.map(|_| ());
            self.stalled.store(false, Ordering::SeqCst);
            resumed.map_err(|_| SocketError::ConnectionClosed)?;
        }

        self.written
            .send(frame)
            .map_err(|_| SocketError::ConnectionClosed)
    }

    async fn receive_frame(&mut self) -> Result<Option<Vec<u8>>, SocketError> {
        match self.inbound.recv().await {
            Some(Frame::Payload(payload)) => Ok(Some(payload)),
            Some(Frame::Broken) => Err(SocketError::ReceiveFailed("connection reset".to_string())),
            Some(Frame::Close) | None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MockPeer {
    pub fn send_raw(&self, payload: &str) {
        let _ = self.inbound.send(Frame::Payload(payload.as_bytes().to_vec()));
    }

    pub fn hang_up(&self) {
        let _ = self.inbound.send(Frame::Close);
    }

    pub fn reset(&self) {
        let _ = self.inbound.send(Frame::Broken);
    }

    pub fn stop_reading(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Writes block until `resume_reading`, like a peer whose TCP window is full
    pub fn pause_reading(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_reading(&self) {
        self.paused.send_replace(false);
    }

    /// Waits until the connection task is blocked writing to this peer
    pub async fn wait_until_stalled(&self) {
        for _ in 0..100 {
            if self.stalled.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("connection task never blocked on a write");
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}
