//! Business logic and port definitions for Delve.
//!
//! This crate defines the "ports" (provider and repository traits) that the
//! infrastructure layer implements, plus the research workflow built on top
//! of them. It depends only on `delve-types`, never on `delve-infra` or any
//! database/IO crate.

pub mod event;
pub mod llm;
pub mod repository;
pub mod research;
pub mod search;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
