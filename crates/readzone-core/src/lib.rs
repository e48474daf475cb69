//! Business logic and repository trait definitions for ReadZone review drafts.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements. It depends only on `readzone-types` -- never on
//! `readzone-infra` or any database/IO crate.

pub mod clock;
pub mod monitor;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;
