//! Business logic services (use cases).
//!
//! Services combine repository calls, the worker pool, and business rules.
//! They depend on traits (ports), never on concrete infrastructure.

pub mod chat;
pub mod research;
