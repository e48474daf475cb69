//! HTTP/REST API layer for the draft engine.
//!
//! Axum-based REST API at `/api/v1/` with caller identity from the
//! `X-User-Id` header, bearer-token operator routes, and an envelope
//! response format.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
