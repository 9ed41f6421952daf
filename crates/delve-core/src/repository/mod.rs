//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (delve-infra) implements. The core crate never depends on any specific
//! storage technology.

pub mod research;

/// Sort order for list queries (by creation time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}
