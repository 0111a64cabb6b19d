//! Configuration type definitions for Parlance
//!
//! All sections use `#[serde(default)]` so a partial `config.json` only needs
//! the values it wants to change.

use serde::{Deserialize, Serialize};

use crate::session::{TokenBudget, ToolSelection};

/// Main configuration struct for Parlance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent loop configuration (model, iterations, prompt)
    pub agent: AgentConfig,
    /// Token budget defaults for new sessions
    pub context: ContextConfig,
    /// Session persistence configuration
    pub sessions: SessionsConfig,
    /// Default tool selection for new sessions
    pub tools: ToolsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Tool-calling loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model name passed to the provider. `None` uses the provider default.
    pub model: Option<String>,
    /// Upper bound on model requests per turn.
    pub max_tool_iterations: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens requested per completion.
    pub max_response_tokens: u32,
    /// Base system prompt. `None` uses the built-in prompt.
    pub system_prompt: Option<String>,
    /// Working directory announced in the system prompt and handed to tools.
    pub workspace: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tool_iterations: 100,
            temperature: 0.7,
            max_response_tokens: 8192,
            system_prompt: None,
            workspace: ".".to_string(),
        }
    }
}

// ============================================================================
// Context Configuration
// ============================================================================

/// Default token budget inherited by every new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Context window size in tokens.
    pub max_tokens: usize,
    /// Fraction (0.0-1.0, exclusive) of `max_tokens` that triggers compression.
    pub compress_ratio: f64,
    /// Number of trailing messages kept verbatim by compression.
    pub keep_last_n: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200_000,
            compress_ratio: 0.7,
            keep_last_n: 3,
        }
    }
}

impl ContextConfig {
    /// Budget for a new session, with out-of-range values replaced by defaults.
    pub fn budget(&self) -> TokenBudget {
        TokenBudget {
            max_tokens: self.max_tokens,
            compress_ratio: self.compress_ratio,
            keep_last_n: self.keep_last_n,
        }
        .normalized()
    }
}

// ============================================================================
// Sessions Configuration
// ============================================================================

/// Session persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Directory for session records. `None` means `~/.parlance/sessions`.
    pub dir: Option<String>,
    /// Sessions kept in memory before idle, saved ones are evicted.
    /// `0` keeps every session.
    pub max_cached: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_cached: 256,
        }
    }
}

// ============================================================================
// Tools Configuration
// ============================================================================

/// Default tool selection for new sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// `["all"]`, `[]` (none) or an explicit list of tool names.
    pub enabled: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["all".to_string()],
        }
    }
}

impl ToolsConfig {
    pub fn selection(&self) -> ToolSelection {
        ToolSelection::from_names(&self.enabled)
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Component,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "component" => Ok(Self::Component),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append JSON logs to this file instead of stderr (json format only).
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
