//! System prompt rendering and request assembly.

use crate::session::{Message, SessionState};
use crate::skills::SkillCatalog;

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant with access to tools.

Use tools when they help you complete the user's request. Read tool results carefully before answering.

Be concise and accurate."#;

/// Builds the system prompt and the message list sent to the model.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    base_prompt: String,
    workspace: Option<String>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            base_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            workspace: None,
        }
    }

    /// Replace the built-in base prompt.
    pub fn with_base_prompt(mut self, prompt: &str) -> Self {
        self.base_prompt = prompt.to_string();
        self
    }

    /// Announce a working directory in the prompt.
    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }

    pub fn base_prompt(&self) -> &str {
        &self.base_prompt
    }

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    /// Render the full system prompt for a set of loaded skills.
    pub fn system_prompt(&self, catalog: &SkillCatalog, loaded: &[String]) -> String {
        let mut prompt = self.base_prompt.trim_end().to_string();
        if let Some(workspace) = &self.workspace {
            prompt.push_str(&format!("\n\nWorking directory: {}", workspace));
        }
        let skills = catalog.render(loaded);
        if !skills.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&skills);
        }
        prompt
    }

    /// Re-render `state.system_prompt` from its loaded skills.
    pub fn refresh(&self, state: &mut SessionState, catalog: &SkillCatalog) {
        state.system_prompt = self.system_prompt(catalog, &state.loaded_skills);
    }

    /// `[system, ...history]` for one model request.
    pub fn build_messages(&self, state: &SessionState) -> Vec<Message> {
        let system = if state.system_prompt.is_empty() {
            self.base_prompt.as_str()
        } else {
            state.system_prompt.as_str()
        };
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(Message::system(system));
        messages.extend(state.messages.iter().cloned());
        messages
    }
}
