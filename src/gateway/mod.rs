// HTTP surface: authenticates peers and hands upgraded sockets to the hub

pub use handlers::{chat_history, chat_websocket, health_check, HealthResponse, TokenQuery};
pub use token::{ChatClaims, TokenConfig, DEFAULT_ISSUER};

mod handlers;
pub mod token;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::shared::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health_check))
        .route("/v1/events/:event_id/chat", get(chat_websocket))
        .route("/v1/events/:event_id/messages", get(chat_history))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
