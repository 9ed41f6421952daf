//! Web search abstractions.
//!
//! - `SearchProvider`: RPITIT trait for concrete search backends
//! - `BoxSearchProvider`: object-safe wrapper for dynamic dispatch

pub mod box_provider;
pub mod provider;
