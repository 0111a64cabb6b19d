//! Provider seam - the interface to language-model clients
//!
//! Vendor HTTP clients live outside this crate and implement [`LLMProvider`].

pub mod types;

pub use types::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};
