// Library crate for the event chat hub
// This file exposes the public API for the binary and integration tests

pub mod chat;
pub mod config;
pub mod gateway;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use chat::{
    BackpressurePolicy, ChatMessage, ChatSocket, ConnectionExit, ConnectionIdentity,
    HistoryRetention, Hub, HubConfig, HubError, HubHandle, HubStats, SystemClock,
};
pub use config::{ConfigError, ServerConfig};
pub use gateway::{router, ChatClaims, TokenConfig};
pub use shared::{AppError, AppState};
