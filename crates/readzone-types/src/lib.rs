//! Shared domain types for the ReadZone review-draft engine.
//!
//! Drafts, canonical books, audit entries, sync and notification reports,
//! operator tooling reports, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod audit;
pub mod book;
pub mod config;
pub mod draft;
pub mod error;
pub mod maintenance;
pub mod notification;
pub mod sync;
