//! Configuration management for Parlance
//!
//! Configuration is loaded from `~/.parlance/config.json` with environment
//! variable overrides of the form `PARLANCE_SECTION_KEY`.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ParlanceError, Result};

impl Config {
    /// Returns the Parlance configuration directory path (~/.parlance)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".parlance")
    }

    /// Returns the path to the config file (~/.parlance/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Directory holding one JSON record per session.
    pub fn sessions_dir(&self) -> PathBuf {
        match &self.sessions.dir {
            Some(dir) => PathBuf::from(dir),
            None => Self::dir().join("sessions"),
        }
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                ParlanceError::Config(format!("{}: {}", path.display(), e))
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.normalize();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        // Agent
        if let Ok(val) = std::env::var("PARLANCE_AGENT_MODEL") {
            self.agent.model = Some(val);
        }
        if let Ok(val) = std::env::var("PARLANCE_AGENT_MAX_TOOL_ITERATIONS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tool_iterations = v;
            }
        }
        if let Ok(val) = std::env::var("PARLANCE_AGENT_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                self.agent.temperature = v;
            }
        }
        if let Ok(val) = std::env::var("PARLANCE_AGENT_MAX_RESPONSE_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agent.max_response_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("PARLANCE_AGENT_SYSTEM_PROMPT") {
            self.agent.system_prompt = Some(val);
        }
        if let Ok(val) = std::env::var("PARLANCE_AGENT_WORKSPACE") {
            self.agent.workspace = val;
        }

        // Context budget
        if let Ok(val) = std::env::var("PARLANCE_CONTEXT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.context.max_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("PARLANCE_CONTEXT_COMPRESS_RATIO") {
            if let Ok(v) = val.parse() {
                self.context.compress_ratio = v;
            }
        }
        if let Ok(val) = std::env::var("PARLANCE_CONTEXT_KEEP_LAST_N") {
            if let Ok(v) = val.parse() {
                self.context.keep_last_n = v;
            }
        }

        // Sessions
        if let Ok(val) = std::env::var("PARLANCE_SESSIONS_DIR") {
            self.sessions.dir = Some(val);
        }
        if let Ok(val) = std::env::var("PARLANCE_SESSIONS_MAX_CACHED") {
            if let Ok(v) = val.parse() {
                self.sessions.max_cached = v;
            }
        }

        // Logging
        if let Ok(val) = std::env::var("PARLANCE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PARLANCE_LOG_FORMAT") {
            if let Ok(v) = val.parse() {
                self.logging.format = v;
            }
        }
    }

    /// Replace out-of-range budget values with their defaults.
    fn normalize(&mut self) {
        let budget = self.context.budget();
        if budget.compress_ratio != self.context.compress_ratio {
            warn!(
                value = self.context.compress_ratio,
                "compress_ratio must be between 0 and 1, using default"
            );
            self.context.compress_ratio = budget.compress_ratio;
        }
        if budget.keep_last_n != self.context.keep_last_n {
            warn!(
                value = self.context.keep_last_n,
                "keep_last_n must be at least 1, using default"
            );
            self.context.keep_last_n = budget.keep_last_n;
        }
        if self.agent.max_tool_iterations == 0 {
            warn!("max_tool_iterations must be at least 1, using default");
            self.agent.max_tool_iterations = AgentConfig::default().max_tool_iterations;
        }
    }

    /// Save the configuration as pretty JSON.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
