//! Turn lifecycle events and the sinks that receive them.
//!
//! The loop reports every lifecycle moment through an [`EventSink`]. Sinks
//! observe only: a sink that errors or panics is logged and ignored, and the
//! turn carries on unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ParlanceError, Result};
use crate::utils::panic::catch_panic;

/// One lifecycle moment of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    UserInput {
        text: String,
    },
    /// Prose the model emitted alongside tool calls
    AssistantThinking {
        text: String,
    },
    ToolCall {
        name: String,
        arguments: String,
        call_id: String,
    },
    ToolResult {
        name: String,
        result: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        call_id: String,
    },
    AssistantResponse {
        text: String,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

/// Receives turn lifecycle events. Every method defaults to a no-op.
///
/// Transports implement the calls they care about.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn user_input(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn assistant_thinking(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn tool_call(&self, _name: &str, _arguments: &str, _call_id: &str) -> Result<()> {
        Ok(())
    }

    async fn tool_result(
        &self,
        _name: &str,
        _result: &str,
        _success: bool,
        _error: Option<&str>,
        _call_id: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn assistant_response(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn error(&self, _message: &str, _details: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// Deliver `event` to the matching sink method, swallowing failures.
pub async fn emit(sink: &dyn EventSink, event: &AgentEvent) {
    let delivery = catch_panic(async {
        match event {
            AgentEvent::UserInput { text } => sink.user_input(text).await,
            AgentEvent::AssistantThinking { text } => sink.assistant_thinking(text).await,
            AgentEvent::ToolCall {
                name,
                arguments,
                call_id,
            } => sink.tool_call(name, arguments, call_id).await,
            AgentEvent::ToolResult {
                name,
                result,
                success,
                error,
                call_id,
            } => {
                sink.tool_result(name, result, *success, error.as_deref(), call_id)
                    .await
            }
            AgentEvent::AssistantResponse { text } => sink.assistant_response(text).await,
            AgentEvent::Error { message, details } => {
                sink.error(message, details.as_deref()).await
            }
        }
    })
    .await;

    match delivery {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, event = event.kind(), "Event sink failed"),
        Err(panic) => warn!(panic = %panic, event = event.kind(), "Event sink panicked"),
    }
}

impl AgentEvent {
    /// Stable snake_case name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::UserInput { .. } => "user_input",
            AgentEvent::AssistantThinking { .. } => "assistant_thinking",
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::AssistantResponse { .. } => "assistant_response",
            AgentEvent::Error { .. } => "error",
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

/// Writes events to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn user_input(&self, text: &str) -> Result<()> {
        debug!(chars = text.chars().count(), "User input received");
        Ok(())
    }

    async fn assistant_thinking(&self, text: &str) -> Result<()> {
        debug!(text = %text, "Assistant thinking");
        Ok(())
    }

    async fn tool_call(&self, name: &str, arguments: &str, call_id: &str) -> Result<()> {
        info!(tool = %name, id = %call_id, arguments = %arguments, "Tool call");
        Ok(())
    }

    async fn tool_result(
        &self,
        name: &str,
        _result: &str,
        success: bool,
        error: Option<&str>,
        call_id: &str,
    ) -> Result<()> {
        info!(tool = %name, id = %call_id, success, error = error.unwrap_or(""), "Tool result");
        Ok(())
    }

    async fn assistant_response(&self, text: &str) -> Result<()> {
        debug!(chars = text.chars().count(), "Assistant response");
        Ok(())
    }

    async fn error(&self, message: &str, details: Option<&str>) -> Result<()> {
        warn!(details = details.unwrap_or(""), "{}", message);
        Ok(())
    }
}

/// Forwards events into a tokio channel, for transports that render them
/// from another task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: AgentEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| ParlanceError::Session("event receiver dropped".into()))
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn user_input(&self, text: &str) -> Result<()> {
        self.send(AgentEvent::UserInput {
            text: text.to_string(),
        })
    }

    async fn assistant_thinking(&self, text: &str) -> Result<()> {
        self.send(AgentEvent::AssistantThinking {
            text: text.to_string(),
        })
    }

    async fn tool_call(&self, name: &str, arguments: &str, call_id: &str) -> Result<()> {
        self.send(AgentEvent::ToolCall {
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
        self.send(AgentEvent::ToolResult {
            name: name.to_string(),
            result: result.to_string(),
            success,
            error: error.map(str::to_string),
            call_id: call_id.to_string(),
        })
    }

    async fn assistant_response(&self, text: &str) -> Result<()> {
        self.send(AgentEvent::AssistantResponse {
            text: text.to_string(),
        })
    }

    async fn error(&self, message: &str, details: Option<&str>) -> Result<()> {
        self.send(AgentEvent::Error {
            message: message.to_string(),
            details: details.map(str::to_string),
        })
    }
}
