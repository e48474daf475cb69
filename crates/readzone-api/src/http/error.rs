//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use readzone_types::error::{DraftError, MaintenanceError, NotificationError, SyncError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Single-draft operation errors.
    Draft(DraftError),
    /// Book sync errors.
    Sync(SyncError),
    /// Expiration notifier errors.
    Notification(NotificationError),
    /// Migration and cleanup errors.
    Maintenance(MaintenanceError),
    /// Missing or invalid caller identity or operator token.
    Unauthorized(String),
    /// Operator routes are disabled.
    Forbidden(String),
    /// Malformed request input.
    Validation(String),
}

impl From<DraftError> for AppError {
    fn from(e: DraftError) -> Self {
        AppError::Draft(e)
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        AppError::Sync(e)
    }
}

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        AppError::Notification(e)
    }
}

impl From<MaintenanceError> for AppError {
    fn from(e: MaintenanceError) -> Self {
        AppError::Maintenance(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            AppError::Draft(DraftError::NotFound) => {
                (StatusCode::NOT_FOUND, "DRAFT_NOT_FOUND", "Draft not found".to_string(), None)
            }
            AppError::Draft(e @ DraftError::VersionConflict { expected, current }) => (
                StatusCode::CONFLICT,
                "VERSION_CONFLICT",
                e.to_string(),
                Some(json!({ "expected_version": expected, "current": current })),
            ),
            AppError::Draft(e @ DraftError::StaleDraft { status }) => (
                StatusCode::GONE,
                "STALE_DRAFT",
                e.to_string(),
                Some(json!({ "status": status })),
            ),
            AppError::Draft(DraftError::Validation(rule)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                rule.to_string(),
                Some(json!({ "rule": rule.code() })),
            ),
            AppError::Draft(e @ DraftError::DuplicateDraft) => {
                (StatusCode::CONFLICT, "DUPLICATE_DRAFT", e.to_string(), None)
            }
            AppError::Draft(e @ DraftError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string(), None)
            }
            AppError::Sync(SyncError::DraftNotFound) => {
                (StatusCode::NOT_FOUND, "DRAFT_NOT_FOUND", "Draft not found".to_string(), None)
            }
            AppError::Sync(e) => (StatusCode::INTERNAL_SERVER_ERROR, "SYNC_ERROR", e.to_string(), None),
            AppError::Notification(e @ (NotificationError::Delivery(_) | NotificationError::Timeout(_))) => {
                (StatusCode::BAD_GATEWAY, "DELIVERY_ERROR", e.to_string(), None)
            }
            AppError::Notification(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "NOTIFICATION_ERROR", e.to_string(), None)
            }
            AppError::Maintenance(e @ MaintenanceError::IntegrityError { issues }) => (
                StatusCode::CONFLICT,
                "INTEGRITY_ERROR",
                e.to_string(),
                Some(json!({ "issues": issues })),
            ),
            AppError::Maintenance(e @ MaintenanceError::ConfirmationRequired { .. }) => {
                (StatusCode::BAD_REQUEST, "CONFIRMATION_REQUIRED", e.to_string(), None)
            }
            AppError::Maintenance(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MAINTENANCE_ERROR", e.to_string(), None)
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone(), None),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        } else {
            tracing::debug!(code, %message, "request rejected");
        }

        (status, Json(ApiResponse::error(code, message, details))).into_response()
    }
}
