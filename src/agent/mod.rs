//! Agent module - the conversation turn and everything it needs
//!
//! - [`AgentLoop`]: runs one turn, alternating model requests and tool calls
//! - [`ContextAccountant`]: token estimates and history compression
//! - [`ContextBuilder`]: system prompt rendering and request assembly
//! - [`EventSink`]: lifecycle events reported while a turn runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Session   │────>│  AgentLoop  │────>│ LLMProvider │
//! │  Registry   │     │             │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                  ┌─────────┼─────────┐
//!                  ▼         ▼         ▼
//!           ┌──────────┐ ┌───────┐ ┌───────────┐
//!           │ Context  │ │ Tools │ │ EventSink │
//!           │Accountant│ │       │ │           │
//!           └──────────┘ └───────┘ └───────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio::sync::RwLock;
//! use parlance::agent::{AgentLoop, NoopSink};
//! use parlance::session::{SessionState, TokenBudget, ToolSelection};
//! use parlance::tools::{EchoTool, ToolRegistry};
//!
//! async fn one_turn(provider: Arc<dyn parlance::providers::LLMProvider>) {
//!     let tools = Arc::new(RwLock::new(ToolRegistry::from_tools(vec![Box::new(EchoTool)])));
//!     let agent = AgentLoop::new(tools).with_provider(provider);
//!     let mut state = SessionState::new("s1", "demo", TokenBudget::default(), ToolSelection::All);
//!     let outcome = agent.run(&mut state, "Hello", &NoopSink).await;
//!     println!("{}", outcome.reply);
//! }
//! ```

pub mod compaction;
mod context;
pub mod events;
mod r#loop;

pub use compaction::{
    CompressionMode, CompressionReport, ContextAccountant, HeuristicCounter, TokenCounter,
};
pub use context::ContextBuilder;
pub use events::{emit, AgentEvent, ChannelSink, EventSink, NoopSink, TracingSink};
pub use r#loop::{
    AgentLoop, TurnOutcome, TurnStop, ITERATION_LIMIT_TEXT, MODEL_FAILURE_PREFIX,
    NO_RESPONSE_TEXT,
};
