//! Infrastructure layer for ReadZone.
//!
//! Contains implementations of the ports defined in `readzone-core`: SQLite
//! storage for drafts, audit, books, checkpoints and maintenance; the
//! configuration loader; and notification delivery transports.

pub mod config;
pub mod notify;
pub mod sqlite;
