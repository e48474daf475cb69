//! Caller identity extractor.
//!
//! Authentication happens upstream; the identity collaborator forwards the
//! authenticated user id in the `X-User-Id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Drafts are scoped to this id.
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_user_id(parts)?
            .map(CallerId)
            .ok_or_else(|| AppError::Unauthorized("Missing caller identity. Provide it via the 'X-User-Id' header.".to_string()))
    }
}

/// Trimmed `X-User-Id` value, `None` when absent or blank.
pub fn header_user_id(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid X-User-Id header encoding".to_string()))?
        .trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}
