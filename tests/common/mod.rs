//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use parlance::agent::{AgentEvent, AgentLoop, EventSink};
use parlance::error::{ParlanceError, Result};
use parlance::interaction::{SessionDefaults, SessionRegistry};
use parlance::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
use parlance::session::{Message, SessionStore};
use parlance::skills::SkillCatalog;
use parlance::tools::{EchoTool, Tool, ToolContext, ToolRegistry, ToolSchema};

/// One recorded model request.
#[derive(Debug, Clone)]
pub struct Request {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// Replays canned responses in order and records every request.
///
/// Once the script runs out it answers `"ok"`.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<LLMResponse>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<LLMResponse>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<LLMResponse> {
        self.requests.lock().unwrap().push(Request { messages, tools });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LLMResponse::text("ok")))
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A file reader whose file never exists.
pub struct MissingFileTool;

#[async_trait]
impl Tool for MissingFileTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read a file"
    }

    fn parameters(&self) -> Value {
        ToolSchema::new()
            .param::<String>("path", "File to read")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let path = args["path"].as_str().unwrap_or_default();
        Err(ParlanceError::NotFound(format!(
            "FileNotFoundError: no such file '{}'",
            path
        )))
    }
}

/// Records the kind of every event it receives, plus error messages.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<AgentEvent>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    fn push(&self, event: AgentEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn user_input(&self, text: &str) -> Result<()> {
        self.push(AgentEvent::UserInput {
            text: text.to_string(),
        })
    }

    async fn tool_call(&self, name: &str, arguments: &str, call_id: &str) -> Result<()> {
        self.push(AgentEvent::ToolCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
            call_id: call_id.to_string(),
        })
    }

    async fn tool_result(
        &self,
        name: &str,
        result: &str,
        success: bool,
        error: Option<&str>,
        call_id: &str,
    ) -> Result<()> {
        self.push(AgentEvent::ToolResult {
            name: name.to_string(),
            result: result.to_string(),
            success,
            error: error.map(str::to_string),
            call_id: call_id.to_string(),
        })
    }

    async fn assistant_response(&self, text: &str) -> Result<()> {
        self.push(AgentEvent::AssistantResponse {
            text: text.to_string(),
        })
    }

    async fn error(&self, message: &str, details: Option<&str>) -> Result<()> {
        self.push(AgentEvent::Error {
            message: message.to_string(),
            details: details.map(str::to_string),
        })
    }
}

/// Tool registry with `echo` and the failing `read`.
pub fn tools() -> Arc<RwLock<ToolRegistry>> {
    Arc::new(RwLock::new(ToolRegistry::from_tools(vec![
        Box::new(EchoTool),
        Box::new(MissingFileTool),
    ])))
}

/// Agent over [`tools`] driven by `provider`.
pub fn agent(provider: Arc<dyn LLMProvider>) -> Arc<AgentLoop> {
    Arc::new(AgentLoop::new(tools()).with_provider(provider))
}

/// Registry with default settings over `store`.
pub async fn registry(provider: Arc<dyn LLMProvider>, store: SessionStore) -> SessionRegistry {
    SessionRegistry::open(
        agent(provider),
        store,
        SessionDefaults::default(),
        SkillCatalog::new(),
    )
    .await
    .expect("registry opens")
}
