//! Tool-calling loop
//!
//! [`AgentLoop::run`] turns one user message into a final reply. It asks the
//! model for a completion, executes any requested tool calls one after
//! another, feeds the results back, and repeats until the model answers in
//! plain text or the iteration bound is reached.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::providers::{ChatOptions, LLMProvider, LLMResponse, Usage};
use crate::session::{Message, SessionState, ToolCall};
use crate::tools::{Tool, ToolContext, ToolRegistry};
use crate::utils::panic::catch_panic;

use super::compaction::{CompressionReport, ContextAccountant};
use super::context::ContextBuilder;
use super::events::{emit, AgentEvent, EventSink};

/// Reply used when the model answers with blank text and no tool calls.
pub const NO_RESPONSE_TEXT: &str = "No response generated";
/// Reply used when a turn hits the iteration bound.
pub const ITERATION_LIMIT_TEXT: &str = "Error: Maximum tool iteration limit reached";
/// Prefix of the reply used when the model call itself fails.
pub const MODEL_FAILURE_PREFIX: &str = "Error: Failed to get response from LLM";

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStop {
    /// The model answered without tool calls
    Done,
    /// The model call failed or returned nothing; the reply carries the
    /// error text
    ModelError,
    /// The iteration bound was reached
    IterationLimit,
}

/// Result of one [`AgentLoop::run`].
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub stop: TurnStop,
    /// Model requests made during the turn
    pub iterations: u32,
    /// Set when the history was compressed during the turn
    pub compression: Option<CompressionReport>,
    /// Token usage summed over the turn's model requests, when reported
    pub usage: Option<Usage>,
}

/// Drives the model/tool loop for one session at a time.
///
/// The loop holds no per-session state; callers pass the session in and
/// must serialize turns on the same session themselves.
pub struct AgentLoop {
    provider: Arc<RwLock<Option<Arc<dyn LLMProvider>>>>,
    tools: Arc<RwLock<ToolRegistry>>,
    accountant: ContextAccountant,
    context_builder: ContextBuilder,
    max_iterations: u32,
    model: Option<String>,
    options: ChatOptions,
}

impl AgentLoop {
    /// Create a loop over a shared tool registry, with no provider yet.
    pub fn new(tools: Arc<RwLock<ToolRegistry>>) -> Self {
        Self {
            provider: Arc::new(RwLock::new(None)),
            tools,
            accountant: ContextAccountant::new(),
            context_builder: ContextBuilder::new(),
            max_iterations: 100,
            model: None,
            options: ChatOptions::new(),
        }
    }

    /// Create a loop configured from the `agent` config section.
    pub fn from_config(config: &Config, tools: Arc<RwLock<ToolRegistry>>) -> Self {
        let mut context_builder = ContextBuilder::new().with_workspace(&config.agent.workspace);
        if let Some(prompt) = &config.agent.system_prompt {
            context_builder = context_builder.with_base_prompt(prompt);
        }
        Self::new(tools)
            .with_context_builder(context_builder)
            .with_accountant(ContextAccountant::new().with_model(config.agent.model.clone()))
            .with_max_iterations(config.agent.max_tool_iterations)
            .with_model(config.agent.model.clone())
            .with_options(
                ChatOptions::new()
                    .with_max_tokens(config.agent.max_response_tokens)
                    .with_temperature(config.agent.temperature),
            )
    }

    pub fn with_provider(self, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider: Arc::new(RwLock::new(Some(provider))),
            ..self
        }
    }

    pub fn with_accountant(mut self, accountant: ContextAccountant) -> Self {
        self.accountant = accountant;
        self
    }

    pub fn with_context_builder(mut self, context_builder: ContextBuilder) -> Self {
        self.context_builder = context_builder;
        self
    }

    /// Bound on model requests per turn. Values below 1 are raised to 1.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the provider. Turns already running keep the old one.
    pub async fn set_provider(&self, provider: Arc<dyn LLMProvider>) {
        *self.provider.write().await = Some(provider);
    }

    pub async fn provider(&self) -> Option<Arc<dyn LLMProvider>> {
        self.provider.read().await.clone()
    }

    /// Register a tool at runtime.
    pub async fn register_tool(&self, tool: Box<dyn Tool>) {
        self.tools.write().await.register(tool);
    }

    pub fn tools(&self) -> &Arc<RwLock<ToolRegistry>> {
        &self.tools
    }

    pub fn accountant(&self) -> &ContextAccountant {
        &self.accountant
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.context_builder
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run one turn: append `input`, loop until a final reply, return it.
    ///
    /// Never fails. Model errors and the iteration bound produce a fixed
    /// reply text that is also appended to the history. Compression runs
    /// at most once per turn, checked before each model request.
    pub async fn run(
        &self,
        state: &mut SessionState,
        input: &str,
        sink: &dyn EventSink,
    ) -> TurnOutcome {
        let span = info_span!(
            "turn",
            session_id = %state.session_id,
            input_chars = input.chars().count()
        );
        self.run_turn(state, input, sink).instrument(span).await
    }

    async fn run_turn(
        &self,
        state: &mut SessionState,
        input: &str,
        sink: &dyn EventSink,
    ) -> TurnOutcome {
        // Clone the provider Arc and release the lock before any await on it.
        let provider = self.provider.read().await.clone();

        state.add_message(Message::user(input));
        emit(
            sink,
            &AgentEvent::UserInput {
                text: input.to_string(),
            },
        )
        .await;

        let mut tool_ctx = ToolContext::new().with_session(&state.session_id);
        if let Some(workspace) = self.context_builder.workspace() {
            tool_ctx = tool_ctx.with_workspace(workspace);
        }

        let mut compression = None;
        let mut usage = None;
        let mut iteration = 0;

        while iteration < self.max_iterations {
            iteration += 1;
            debug!("Tool iteration {} of {}", iteration, self.max_iterations);

            if compression.is_none() && self.accountant.should_compress(state) {
                let report = self
                    .accountant
                    .compress(state, provider.as_deref())
                    .await;
                info!(
                    session_id = %state.session_id,
                    mode = ?report.mode,
                    tokens_before = report.tokens_before,
                    tokens_after = report.tokens_after,
                    "Compressed history before model request"
                );
                compression = Some(report);
            }

            let response = match self.request(provider.as_deref(), state, &mut usage).await {
                Ok(response) => response,
                Err(reason) => {
                    let reply = format!("{} ({})", MODEL_FAILURE_PREFIX, reason);
                    state.add_message(Message::assistant(&reply));
                    emit(
                        sink,
                        &AgentEvent::Error {
                            message: MODEL_FAILURE_PREFIX.to_string(),
                            details: Some(reason),
                        },
                    )
                    .await;
                    return TurnOutcome {
                        reply,
                        stop: TurnStop::ModelError,
                        iterations: iteration,
                        compression,
                        usage,
                    };
                }
            };

            if !response.has_tool_calls() {
                let reply = if response.content.trim().is_empty() {
                    NO_RESPONSE_TEXT.to_string()
                } else {
                    response.content
                };
                state.add_message(Message::assistant(&reply));
                emit(
                    sink,
                    &AgentEvent::AssistantResponse {
                        text: reply.clone(),
                    },
                )
                .await;
                return TurnOutcome {
                    reply,
                    stop: TurnStop::Done,
                    iterations: iteration,
                    compression,
                    usage,
                };
            }

            let calls: Vec<ToolCall> = response.tool_calls.into_iter().map(Into::into).collect();
            state.add_message(Message::assistant_with_tools(
                &response.content,
                calls.clone(),
            ));
            if !response.content.trim().is_empty() {
                emit(
                    sink,
                    &AgentEvent::AssistantThinking {
                        text: response.content.clone(),
                    },
                )
                .await;
            }

            // Sequential on purpose: later calls may depend on earlier ones.
            for call in &calls {
                info!(tool = %call.name, id = %call.id, "Executing tool");
                emit(
                    sink,
                    &AgentEvent::ToolCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        call_id: call.id.clone(),
                    },
                )
                .await;

                let result = {
                    let tools = self.tools.read().await;
                    tools.execute_call(call, &tool_ctx).await
                };

                emit(
                    sink,
                    &AgentEvent::ToolResult {
                        name: call.name.clone(),
                        result: result.result.clone().unwrap_or_default(),
                        success: result.success,
                        error: result.error.clone(),
                        call_id: call.id.clone(),
                    },
                )
                .await;
                state.add_message(Message::tool_result(
                    &call.id,
                    &call.name,
                    &result.to_display_string(),
                ));
            }
        }

        warn!(
            session_id = %state.session_id,
            iterations = iteration,
            "Tool loop reached maximum iterations"
        );
        state.add_message(Message::assistant(ITERATION_LIMIT_TEXT));
        emit(
            sink,
            &AgentEvent::Error {
                message: ITERATION_LIMIT_TEXT.to_string(),
                details: Some(format!("{} iterations", iteration)),
            },
        )
        .await;
        TurnOutcome {
            reply: ITERATION_LIMIT_TEXT.to_string(),
            stop: TurnStop::IterationLimit,
            iterations: iteration,
            compression,
            usage,
        }
    }

    /// One model request. `Err` carries the failure text for the reply.
    ///
    /// A completion with neither text nor tool calls is a failure too.
    async fn request(
        &self,
        provider: Option<&dyn LLMProvider>,
        state: &SessionState,
        usage: &mut Option<Usage>,
    ) -> std::result::Result<LLMResponse, String> {
        let Some(provider) = provider else {
            error!("No provider configured");
            return Err("no provider configured".to_string());
        };

        let messages = self.context_builder.build_messages(state);
        // Short-lived read lock; tools may be registered between requests.
        let tool_definitions = {
            let tools = self.tools.read().await;
            tools.definitions_for(&state.enabled_tools)
        };

        let start = Instant::now();
        let outcome = catch_panic(provider.chat(
            messages,
            tool_definitions,
            self.model.as_deref(),
            self.options.clone(),
        ))
        .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) => {
                if let Some(reported) = response.usage {
                    *usage = Some(match usage.take() {
                        Some(total) => total + reported,
                        None => reported,
                    });
                }
                debug!(
                    provider = provider.name(),
                    latency_ms,
                    tool_calls = response.tool_calls.len(),
                    prompt_tokens = response.usage.map(|u| u.prompt_tokens),
                    completion_tokens = response.usage.map(|u| u.completion_tokens),
                    "Model responded"
                );
                if response.is_empty() {
                    warn!(provider = provider.name(), latency_ms, "Model returned an empty completion");
                    return Err("empty response".to_string());
                }
                Ok(response)
            }
            Ok(Err(e)) => {
                error!(provider = provider.name(), latency_ms, error = %e, "Model request failed");
                Err(e.to_string())
            }
            Err(panic) => {
                error!(provider = provider.name(), latency_ms, panic = %panic, "Model request panicked");
                Err(panic)
            }
        }
    }
}
