//! Shared domain types for Delve.
//!
//! This crate contains the core domain types used across the Delve service:
//! research jobs and reports, search results, LLM request/response shapes,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, schemars.

pub mod config;
pub mod error;
pub mod llm;
pub mod research;
pub mod search;
