//! Slash-command hooks.
//!
//! Text that starts with `/` is routed to a named [`HookHandler`] instead of
//! the model:
//!
//! ```text
//! /<name> [arg1] [arg2] ...
//! ```
//!
//! Names are case-insensitive and arguments are split on whitespace, with no
//! quoting. A handler that errors or panics produces an error [`HookResult`];
//! it never aborts the caller.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use parlance::error::Result;
//! use parlance::interaction::{HookDispatcher, HookHandler, HookResult};
//! use parlance::session::{SessionState, TokenBudget, ToolSelection};
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl HookHandler for Ping {
//!     fn description(&self) -> &str {
//!         "Reply with pong"
//!     }
//!
//!     async fn handle(&self, _args: &[String], _state: &mut SessionState) -> Result<HookResult> {
//!         Ok(HookResult::ok("pong"))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let dispatcher = HookDispatcher::new();
//! dispatcher.register("ping", Arc::new(Ping)).await;
//!
//! let mut state = SessionState::new("s1", "s1", TokenBudget::default(), ToolSelection::All);
//! let result = dispatcher.dispatch("/PING", &mut state).await.unwrap();
//! assert_eq!(result.message, "pong");
//! assert!(dispatcher.dispatch("hello", &mut state).await.is_none());
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::session::SessionState;
use crate::utils::panic::catch_panic;

// ---------------------------------------------------------------------------
// Hook result
// ---------------------------------------------------------------------------

/// What a transport should do after showing a hook's message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    #[default]
    None,
    /// Make `action_data.session_id` the transport's current session
    SwitchSession,
    /// The set of sessions changed; re-read it
    RefreshSessions,
}

/// Outcome of a hook command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    /// Text shown to the user
    pub message: String,
    #[serde(default)]
    pub action: HookAction,
    #[serde(default)]
    pub action_data: Map<String, Value>,
}

impl HookResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            action: HookAction::None,
            action_data: Map::new(),
        }
    }

    /// An error result. Same shape as [`HookResult::ok`]; the message carries
    /// the problem.
    pub fn error(message: impl Into<String>) -> Self {
        Self::ok(message)
    }

    pub fn switch_session(message: impl Into<String>, session_id: &str) -> Self {
        let mut action_data = Map::new();
        action_data.insert("session_id".into(), Value::String(session_id.to_string()));
        Self {
            message: message.into(),
            action: HookAction::SwitchSession,
            action_data,
        }
    }

    pub fn refresh_sessions(message: impl Into<String>, new_session_id: Option<&str>) -> Self {
        let mut action_data = Map::new();
        action_data.insert(
            "new_session_id".into(),
            new_session_id.map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        Self {
            message: message.into(),
            action: HookAction::RefreshSessions,
            action_data,
        }
    }

    /// The session a `SwitchSession` result points at.
    pub fn target_session(&self) -> Option<&str> {
        match self.action {
            HookAction::SwitchSession => self.action_data.get("session_id")?.as_str(),
            _ => None,
        }
    }
}

impl std::fmt::Display for HookResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// A slash command.
///
/// Every hook has the same shape: positional string arguments and the
/// caller's session, locked for the duration of the call.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// One-line summary for `/help`.
    fn description(&self) -> &str;

    /// Argument synopsis, e.g. `<session>`.
    fn usage(&self) -> &str {
        ""
    }

    async fn handle(&self, args: &[String], state: &mut SessionState) -> Result<HookResult>;
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes slash commands to registered handlers.
///
/// Registration is guarded by an async `RwLock`, so hooks may be added while
/// other sessions are dispatching.
#[derive(Default)]
pub struct HookDispatcher {
    hooks: RwLock<BTreeMap<String, Arc<dyn HookHandler>>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. A leading `/` is ignored and the
    /// name is lower-cased. Re-registering a name replaces the handler.
    pub async fn register(&self, name: &str, handler: Arc<dyn HookHandler>) {
        let key = normalize_name(name);
        if self.hooks.write().await.insert(key.clone(), handler).is_some() {
            warn!(hook = %key, "Replacing existing hook");
        } else {
            debug!(hook = %key, "Registered hook");
        }
    }

    pub async fn unregister(&self, name: &str) -> bool {
        self.hooks.write().await.remove(&normalize_name(name)).is_some()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.hooks.read().await.contains_key(&normalize_name(name))
    }

    /// Registered names, sorted, without the leading `/`.
    pub async fn names(&self) -> Vec<String> {
        self.hooks.read().await.keys().cloned().collect()
    }

    /// `(name, usage, description)` for every hook, sorted by name.
    pub async fn describe(&self) -> Vec<(String, String, String)> {
        self.hooks
            .read()
            .await
            .iter()
            .map(|(name, h)| (name.clone(), h.usage().to_string(), h.description().to_string()))
            .collect()
    }

    /// Handle `text` if it is a hook command.
    ///
    /// Returns `None` when the trimmed text does not start with `/`, so the
    /// caller can hand it to the model instead.
    pub async fn dispatch(&self, text: &str, state: &mut SessionState) -> Option<HookResult> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let mut parts = text.split_whitespace();
        let name = normalize_name(parts.next().unwrap_or("/"));
        let args: Vec<String> = parts.map(str::to_string).collect();

        // Clone the handler out so the lock is not held while it runs; a
        // handler may itself read the hook table (`/help`).
        let handler = self.hooks.read().await.get(&name).cloned();
        let Some(handler) = handler else {
            let supported = self
                .names()
                .await
                .iter()
                .map(|n| format!("/{}", n))
                .collect::<Vec<_>>()
                .join(", ");
            return Some(HookResult::error(format!(
                "Unknown hook: /{}. Supported: {}",
                name, supported
            )));
        };

        debug!(hook = %name, args = args.len(), "Dispatching hook");
        let result = match catch_panic(handler.handle(&args, state)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(hook = %name, error = %e, "Hook failed");
                HookResult::error(format!("Error executing hook /{}: {}", name, e))
            }
            Err(panic) => {
                warn!(hook = %name, panic = %panic, "Hook panicked");
                HookResult::error(format!("Error executing hook /{}: {}", name, panic))
            }
        };
        Some(result)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_start_matches('/').to_lowercase()
}
