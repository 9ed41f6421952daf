//! Infrastructure layer for Delve.
//!
//! Contains implementations of the traits defined in `delve-core`: SQLite
//! job storage, the Anthropic completion provider, the Brave web search
//! adapter, and the configuration loader.

pub mod config;
pub mod llm;
pub mod search;
pub mod sqlite;
