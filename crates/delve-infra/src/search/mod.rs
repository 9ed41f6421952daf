//! Web search backends implementing [`SearchProvider`](delve_core::search::provider::SearchProvider).

pub mod brave;

pub use brave::BraveSearchProvider;
