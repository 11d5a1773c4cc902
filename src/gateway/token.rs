use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, warn};

use crate::shared::AppError;

pub const DEFAULT_ISSUER: &str = "event-chat-hub";

/// Claims carried by the bearer token an external issuer minted for a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatClaims {
    pub user_id: i64,
    pub username: String,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
    pub iss: String,
    pub aud: String,
}

/// Configuration for verifying bearer tokens
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    issuer: String,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Validates a token and returns its claims. Issuer and audience must both
    /// match the configured issuer.
    #[instrument(skip(self, token))]
    pub fn validate_token(&self, token: &str) -> Result<ChatClaims, AppError> {
        debug!("Decoding and validating JWT token");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.issuer.as_str()]);

        decode::<ChatClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map(|data| {
            debug!(
                user_id = data.claims.user_id,
                username = %data.claims.username,
                exp = data.claims.exp,
                "JWT token decoded successfully"
            );
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::Unauthorized(format!("Invalid token: {}", e))
        })
    }

    /// Finds the bearer token on a request and validates it.
    ///
    /// Browsers cannot set headers on a WebSocket handshake, so a `token`
    /// query parameter is accepted as well; the header wins when both exist.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<ChatClaims, AppError> {
        let token = bearer_token(headers).or(query_token).ok_or_else(|| {
            warn!("Missing bearer token in request");
            AppError::Unauthorized("Missing authentication token".to_string())
        })?;

        self.validate_token(token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
