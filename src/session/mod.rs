//! Session module - conversation state and its persistence
//!
//! - [`SessionState`]: one conversation's history, skills, tool selection
//!   and token budget
//! - [`SessionStore`]: one JSON record per session, on disk or in memory
//!
//! # Example
//!
//! ```
//! use parlance::session::{Message, SessionState, SessionStore, TokenBudget, ToolSelection};
//!
//! # tokio_test::block_on(async {
//! let store = SessionStore::new_memory();
//! let mut state = SessionState::new("s1", "session-s1", TokenBudget::default(), ToolSelection::All);
//! state.add_message(Message::user("Hello!"));
//! store.save(&state).await.unwrap();
//!
//! let loaded = store.load("s1").await.unwrap().unwrap();
//! assert_eq!(loaded.messages.len(), 1);
//! # });
//! ```

pub mod store;
pub mod types;

pub use store::SessionStore;
pub use types::{Message, MessageTag, Role, SessionState, TokenBudget, ToolCall, ToolSelection};
