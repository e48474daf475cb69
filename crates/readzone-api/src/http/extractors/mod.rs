//! Request extractors: caller identity, operator auth and query parameters.

pub mod identity;
pub mod operator;
pub mod query;
