use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::chat::{ChatMessage, ConnectionIdentity, EventId, HubStats};
use crate::shared::{AppError, AppState};

/// Optional `?token=` for clients that cannot set an Authorization header
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub stats: HubStats,
}

/// WebSocket endpoint for an event's chat room
///
/// GET /v1/events/:event_id/chat
#[instrument(name = "chat_websocket", skip(ws, query, headers, state))]
pub async fn chat_websocket(
    ws: WebSocketUpgrade,
    Path(event_id): Path<EventId>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    info!(event_id, "WebSocket connection requested");

    let claims = state.tokens.authenticate(&headers, query.token.as_deref())?;

    info!(
        event_id,
        user_id = claims.user_id,
        username = %claims.username,
        "WebSocket authentication successful"
    );

    let identity = ConnectionIdentity::new(event_id, claims.user_id, claims.username);
    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        hub.accept(socket, identity).await;
    }))
}

/// Stored history of an event's chat room, oldest first
///
/// GET /v1/events/:event_id/messages
#[instrument(name = "chat_history", skip(query, headers, state))]
pub async fn chat_history(
    Path(event_id): Path<EventId>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let claims = state.tokens.authenticate(&headers, query.token.as_deref())?;
    let history = state.hub.history(event_id).await?;

    info!(
        event_id,
        user_id = claims.user_id,
        messages = history.len(),
        "Served chat history"
    );
    Ok(Json(history))
}

/// GET /v1/health
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let stats = state.hub.stats().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        stats,
    }))
}
