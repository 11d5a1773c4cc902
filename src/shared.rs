use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::chat::{HubError, HubHandle};
use crate::gateway::TokenConfig;

/// Shared application state containing all dependencies
#[derive(Clone, Debug)]
pub struct AppState {
    pub hub: HubHandle,
    pub tokens: Arc<TokenConfig>,
}

impl AppState {
    pub fn new(hub: HubHandle, tokens: TokenConfig) -> Self {
        Self {
            hub,
            tokens: Arc::new(tokens),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<HubError> for AppError {
    fn from(e: HubError) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
