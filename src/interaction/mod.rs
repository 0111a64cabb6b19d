//! Interaction layer - what transports talk to
//!
//! - [`SessionRegistry`]: owns every session, routes text to hooks or the agent
//! - [`HookDispatcher`]: slash commands such as `/new`, `/switch`, `/list`
//! - [`BlockingRegistry`]: synchronous wrapper for blocking transports
//!
//! ```text
//! transport ──> SessionRegistry::handle(text, session_id)
//!                   │
//!                   ├── "/..." ──> HookDispatcher ──> HookResult
//!                   └── else  ──> AgentLoop::run ──> reply
//!                   │
//!                   └── SessionStore::save
//! ```

mod blocking;
pub mod hook;
mod manager;

pub use blocking::BlockingRegistry;
pub use hook::{HookAction, HookDispatcher, HookHandler, HookResult};
pub use manager::{HandleResult, SessionDefaults, SessionRegistry, SessionSummary};
