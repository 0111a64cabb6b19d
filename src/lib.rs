//! Parlance - multi-session conversation core for tool-using agents

pub mod agent;
pub mod config;
pub mod error;
pub mod interaction;
pub mod providers;
pub mod session;
pub mod skills;
pub mod tools;
pub mod utils;

pub use agent::{AgentEvent, AgentLoop, EventSink, TurnOutcome, TurnStop};
pub use config::Config;
pub use error::{ParlanceError, Result};
pub use interaction::{HandleResult, HookAction, HookResult, SessionRegistry};
pub use providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};
pub use session::{Message, Role, SessionState, SessionStore, ToolCall};
