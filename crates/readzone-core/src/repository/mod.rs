//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (readzone-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod audit;
pub mod book;
pub mod checkpoint;
pub mod draft;
pub mod maintenance;

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}
