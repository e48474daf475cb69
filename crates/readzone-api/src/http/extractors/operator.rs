//! Operator authentication extractor.
//!
//! Operator routes require `Authorization: Bearer <server.admin_token>`.
//! When no token is configured the routes are disabled.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::error::AppError;
use crate::http::extractors::identity::header_user_id;
use crate::state::AppState;

/// Actor id recorded for operator actions when no `X-User-Id` is sent.
pub const DEFAULT_OPERATOR: &str = "operator";

/// Authenticated operator. Extracting this validates the bearer token.
#[derive(Debug, Clone)]
pub struct Operator {
    pub actor_id: String,
}

impl FromRequestParts<AppState> for Operator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.server.admin_token.as_deref() else {
            return Err(AppError::Forbidden(
                "Operator routes are disabled; set server.admin_token to enable them.".to_string(),
            ));
        };

        let provided = bearer_token(parts)?;
        if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            tracing::warn!("rejected operator request with invalid token");
            return Err(AppError::Unauthorized("Invalid operator token".to_string()));
        }

        Ok(Operator {
            actor_id: header_user_id(parts)?.unwrap_or_else(|| DEFAULT_OPERATOR.to_string()),
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<String, AppError> {
    let auth = parts.headers.get("authorization").ok_or_else(|| {
        AppError::Unauthorized("Missing operator token. Provide via 'Authorization: Bearer <token>' header.".to_string())
    })?;
    let auth = auth
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".to_string()))?;
    auth.strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or_else(|| AppError::Unauthorized("Authorization header must use the Bearer scheme".to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
