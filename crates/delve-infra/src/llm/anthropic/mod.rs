//! Anthropic Claude LLM provider implementation.
//!
//! This module provides the [`AnthropicProvider`] which implements the
//! [`LlmProvider`](delve_core::llm::provider::LlmProvider) trait for
//! the Anthropic Messages API, including SSE streaming and tool calling.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::AnthropicProvider;
