//! Session types for Parlance
//!
//! Messages, roles and tool calls, plus the per-session state that the
//! agent loop mutates and the store persists. `SessionState` serializes
//! directly to the on-disk session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The complete mutable state of one conversation.
///
/// History order is significant and never rearranged; only compression and
/// `/clear` remove messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Opaque session key
    pub session_id: String,
    /// Human-readable name, unique within a registry
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// Rendered system prompt, rebuilt whenever the loaded skills change
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub enabled_tools: ToolSelection,
    /// Loaded skill names, unique, in load order
    #[serde(default, rename = "enabled_skills")]
    pub loaded_skills: Vec<String>,
    #[serde(default, rename = "conversation_history")]
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub budget: TokenBudget,
}

impl SessionState {
    /// Create an empty session.
    ///
    /// # Example
    /// ```
    /// use parlance::session::{SessionState, TokenBudget, ToolSelection};
    ///
    /// let state = SessionState::new("s1", "session-s1", TokenBudget::default(), ToolSelection::All);
    /// assert!(state.messages.is_empty());
    /// assert_eq!(state.created_at, state.last_active);
    /// ```
    pub fn new(session_id: &str, name: &str, budget: TokenBudget, tools: ToolSelection) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            name: name.to_string(),
            created_at: now,
            last_active: now,
            system_prompt: String::new(),
            enabled_tools: tools,
            loaded_skills: Vec::new(),
            messages: Vec::new(),
            budget,
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop the whole conversation history. Skills and settings are kept.
    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Record a skill as loaded. Returns `false` if it already was.
    pub fn load_skill(&mut self, name: &str) -> bool {
        if self.has_skill(name) {
            return false;
        }
        self.loaded_skills.push(name.to_string());
        true
    }

    /// Remove a loaded skill. Returns `false` if it was not loaded.
    pub fn unload_skill(&mut self, name: &str) -> bool {
        let before = self.loaded_skills.len();
        self.loaded_skills.retain(|s| s != name);
        before != self.loaded_skills.len()
    }

    pub fn has_skill(&self, name: &str) -> bool {
        self.loaded_skills.iter().any(|s| s == name)
    }
}

/// Token budget parameters controlling compression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_tokens: usize,
    pub compress_ratio: f64,
    pub keep_last_n: usize,
}

impl TokenBudget {
    /// Token count above which compression triggers.
    pub fn threshold(&self) -> usize {
        (self.max_tokens as f64 * self.compress_ratio) as usize
    }

    /// Whether the ratio lies in `(0, 1)` and at least one message is kept.
    pub fn is_valid(&self) -> bool {
        self.compress_ratio > 0.0 && self.compress_ratio < 1.0 && self.keep_last_n >= 1
    }

    /// This budget with out-of-range values replaced by the defaults.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            max_tokens: self.max_tokens,
            compress_ratio: if self.compress_ratio > 0.0 && self.compress_ratio < 1.0 {
                self.compress_ratio
            } else {
                defaults.compress_ratio
            },
            keep_last_n: if self.keep_last_n >= 1 {
                self.keep_last_n
            } else {
                defaults.keep_last_n
            },
        }
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_tokens: 200_000,
            compress_ratio: 0.7,
            keep_last_n: 3,
        }
    }
}

/// Which registered tools a session exposes to the model.
///
/// Persisted as a plain name list: `["all"]`, `[]`, or explicit names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum ToolSelection {
    #[default]
    All,
    None,
    Named(Vec<String>),
}

impl ToolSelection {
    /// Interpret a name list, honoring the `all` and `none` sentinels.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<String> = names
            .iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        if names.iter().any(|n| n == "all") {
            Self::All
        } else if names.is_empty() || names.iter().all(|n| n == "none") {
            Self::None
        } else {
            Self::Named(names.into_iter().filter(|n| n != "none").collect())
        }
    }
}

impl From<Vec<String>> for ToolSelection {
    fn from(names: Vec<String>) -> Self {
        Self::from_names(&names)
    }
}

impl From<ToolSelection> for Vec<String> {
    fn from(selection: ToolSelection) -> Self {
        match selection {
            ToolSelection::All => vec!["all".to_string()],
            ToolSelection::None => Vec::new(),
            ToolSelection::Named(names) => names,
        }
    }
}

impl std::fmt::Display for ToolSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolSelection::All => write!(f, "all"),
            ToolSelection::None => write!(f, "none"),
            ToolSelection::Named(names) => write!(f, "{}", names.join(", ")),
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// May be empty when the message only carries tool calls
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the call this tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name, on tool messages only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Marks synthetic messages produced by compression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<MessageTag>,
}

impl Message {
    fn plain(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            tag: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn system(content: &str) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create a tool result message answering `tool_call_id`.
    ///
    /// # Example
    /// ```
    /// use parlance::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_1", "read", "file contents");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    /// assert_eq!(msg.name.as_deref(), Some("read"));
    /// ```
    pub fn tool_result(tool_call_id: &str, name: &str, content: &str) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            name: Some(name.to_string()),
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Synthetic assistant message carrying a history summary.
    pub fn summary(summary: &str) -> Self {
        Self {
            tag: Some(MessageTag::Summary),
            ..Self::plain(Role::Assistant, &format!("[history summary] {}", summary))
        }
    }

    /// Synthetic assistant message naming the loaded skills.
    pub fn skills_metadata(skills: &[String]) -> Self {
        Self {
            tag: Some(MessageTag::Metadata),
            ..Self::plain(
                Role::Assistant,
                &format!("[loaded skills] {}", skills.join(", ")),
            )
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }

    pub fn is_summary(&self) -> bool {
        self.tag == Some(MessageTag::Summary)
    }
}

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Tag for messages synthesized by compression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageTag {
    Summary,
    Metadata,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument string as produced by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}
