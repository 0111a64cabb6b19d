//! Token accounting and history compression.
//!
//! [`ContextAccountant`] estimates how many tokens a session's history uses,
//! decides when that crosses the session's budget, and compresses the
//! history by summarising everything older than the last `keep_last_n`
//! messages. Compression never fails: every problem degrades to keeping the
//! recent tail without a summary.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::providers::{ChatOptions, LLMProvider};
use crate::session::{Message, Role, SessionState};
use crate::utils::panic::catch_panic;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a conversation summary assistant.";

/// Estimates the token length of a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Roughly four characters per token, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// What a compression pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// History was empty
    Empty,
    /// Nothing older than the retained tail; history untouched
    TooShort,
    /// Older messages dropped without a summary
    TailOnly,
    /// Older messages replaced by a summary
    Summarized,
}

/// Outcome of [`ContextAccountant::compress`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionReport {
    pub mode: CompressionMode,
    pub summary: Option<String>,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub messages_before: usize,
    pub messages_after: usize,
    /// Human-readable status line
    pub message: String,
}

/// Counts tokens, decides when to compress and performs compression.
#[derive(Clone)]
pub struct ContextAccountant {
    counter: Arc<dyn TokenCounter>,
    model: Option<String>,
}

impl Default for ContextAccountant {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextAccountant {
    /// Accountant using [`HeuristicCounter`].
    pub fn new() -> Self {
        Self {
            counter: Arc::new(HeuristicCounter),
            model: None,
        }
    }

    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Model requested for summaries. `None` uses the provider default.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Tokens used by a list of messages.
    ///
    /// Content plus, for tool calls, each call's name and argument string.
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| {
                let calls: usize = m
                    .tool_calls
                    .iter()
                    .flatten()
                    .map(|c| self.counter.count(&c.name) + self.counter.count(&c.arguments))
                    .sum();
                self.counter.count(&m.content) + calls
            })
            .sum()
    }

    /// Tokens used by a session's history.
    pub fn token_count(&self, state: &SessionState) -> usize {
        self.count_messages(&state.messages)
    }

    /// True when the history exceeds `max_tokens * compress_ratio`.
    pub fn should_compress(&self, state: &SessionState) -> bool {
        self.token_count(state) > state.budget.threshold()
    }

    /// Compress `state.messages` in place.
    ///
    /// Keeps the last `keep_last_n` messages (more if needed so the tail
    /// does not open with orphaned tool results) and replaces everything
    /// older with a model-written summary. Without a provider, or when the
    /// summary cannot be produced, the older messages are dropped instead.
    pub async fn compress(
        &self,
        state: &mut SessionState,
        provider: Option<&dyn LLMProvider>,
    ) -> CompressionReport {
        let tokens_before = self.token_count(state);
        let messages_before = state.messages.len();
        let keep_n = state.budget.keep_last_n;

        if state.messages.is_empty() {
            return self.report(
                state,
                CompressionMode::Empty,
                None,
                tokens_before,
                messages_before,
                "History is empty, nothing to compress.".to_string(),
            );
        }

        let split = split_point(&state.messages, keep_n);
        if split == 0 {
            return self.report(
                state,
                CompressionMode::TooShort,
                None,
                tokens_before,
                messages_before,
                format!(
                    "History has {} messages, nothing older than the last {} to compress.",
                    messages_before, keep_n
                ),
            );
        }

        let summarized = split;
        let transcript = build_transcript(&state.messages[..split]);
        let summary = if transcript.is_empty() {
            Err("nothing to summarize".to_string())
        } else {
            match provider {
                Some(provider) => self.summarize(provider, &transcript).await,
                None => Err("no model configured".to_string()),
            }
        };

        let tail = state.messages.split_off(split);
        let kept = tail.len();
        match summary {
            Ok(summary) => {
                let mut compressed = vec![Message::summary(&summary)];
                if !state.loaded_skills.is_empty() {
                    compressed.push(Message::skills_metadata(&state.loaded_skills));
                }
                compressed.extend(tail.iter().cloned());

                if self.count_messages(&compressed) > tokens_before {
                    state.messages = tail;
                    return self.tail_only(
                        state,
                        tokens_before,
                        messages_before,
                        "summary was larger than the history it replaced",
                    );
                }

                state.messages = compressed;
                let tokens_after = self.token_count(state);
                info!(
                    session_id = %state.session_id,
                    tokens_before,
                    tokens_after,
                    summarized,
                    "Context compressed"
                );
                self.report(
                    state,
                    CompressionMode::Summarized,
                    Some(summary),
                    tokens_before,
                    messages_before,
                    format!(
                        "Context compressed: {} -> {} tokens (kept last {} messages, summarized {} messages)",
                        tokens_before,
                        tokens_after,
                        kept,
                        summarized
                    ),
                )
            }
            Err(reason) => {
                state.messages = tail;
                self.tail_only(state, tokens_before, messages_before, &reason)
            }
        }
    }

    async fn summarize(
        &self,
        provider: &dyn LLMProvider,
        transcript: &str,
    ) -> std::result::Result<String, String> {
        let messages = vec![
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(&build_summary_prompt(transcript)),
        ];
        let request = provider.chat(messages, Vec::new(), self.model.as_deref(), ChatOptions::new());
        match catch_panic(request).await {
            Ok(Ok(response)) => {
                let summary = response.content.trim().to_string();
                if summary.is_empty() {
                    Err("empty summary".to_string())
                } else {
                    Ok(summary)
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Summary request failed");
                Err(format!("summary failed: {}", e))
            }
            Err(panic) => {
                warn!(panic = %panic, "Summary request panicked");
                Err(format!("summary failed: {}", panic))
            }
        }
    }

    fn tail_only(
        &self,
        state: &SessionState,
        tokens_before: usize,
        messages_before: usize,
        reason: &str,
    ) -> CompressionReport {
        debug!(session_id = %state.session_id, reason, "Compression kept tail only");
        self.report(
            state,
            CompressionMode::TailOnly,
            None,
            tokens_before,
            messages_before,
            format!(
                "Context compressed: kept last {} messages only ({})",
                state.messages.len(),
                reason
            ),
        )
    }

    fn report(
        &self,
        state: &SessionState,
        mode: CompressionMode,
        summary: Option<String>,
        tokens_before: usize,
        messages_before: usize,
        message: String,
    ) -> CompressionReport {
        CompressionReport {
            mode,
            summary,
            tokens_before,
            tokens_after: self.token_count(state),
            messages_before,
            messages_after: state.messages.len(),
            message,
        }
    }
}

/// Index where the retained tail starts.
///
/// Normally `len - keep_n`; moved earlier while the tail would begin with a
/// tool result, so a tool message is never separated from the assistant
/// message that issued its call.
pub fn split_point(messages: &[Message], keep_n: usize) -> usize {
    let mut split = messages.len().saturating_sub(keep_n);
    while split > 0 && split < messages.len() && messages[split].role == Role::Tool {
        split -= 1;
    }
    split
}

/// Plain-text transcript of messages for the summariser.
///
/// Tool results and empty messages are left out. Assistant messages that
/// called tools are annotated with the tool names, never the payloads.
pub fn build_transcript(messages: &[Message]) -> String {
    let mut lines = Vec::new();
    for msg in messages {
        let content = msg.content.trim();
        let role = match msg.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
            Role::Tool => continue,
        };
        match &msg.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                let marker = format!("[used tools: {}]", names.join(", "));
                if content.is_empty() {
                    lines.push(format!("{}: {}", role, marker));
                } else {
                    lines.push(format!("{}: {} {}", role, content, marker));
                }
            }
            _ if content.is_empty() => {}
            _ => lines.push(format!("{}: {}", role, content)),
        }
    }
    lines.join("\n")
}

/// Instructions plus transcript, sent as the user message of a summary request.
pub fn build_summary_prompt(transcript: &str) -> String {
    format!(
        "Summarize the following conversation concisely. Keep key facts, decisions, \
         open tasks and anything the user asked to remember. Mention which tools were \
         used and what for when it matters.\n\n{}",
        transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParlanceError, Result};
    use crate::providers::{LLMResponse, ToolDefinition};
    use crate::session::{TokenBudget, ToolCall, ToolSelection};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    struct SummaryProvider {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl SummaryProvider {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("503 upstream".to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for SummaryProvider {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            self.seen.lock().unwrap().push(messages);
            match &self.reply {
                Ok(text) => Ok(LLMResponse::text(text)),
                Err(e) => Err(ParlanceError::Provider(e.clone())),
            }
        }

        fn default_model(&self) -> &str {
            "summary-test"
        }

        fn name(&self) -> &str {
            "summary-test"
        }
    }

    fn accountant() -> ContextAccountant {
        ContextAccountant::new().with_counter(Arc::new(WordCounter))
    }

    fn state_with(keep_last_n: usize, messages: Vec<Message>) -> SessionState {
        let mut s = SessionState::new(
            "s1",
            "session-s1",
            TokenBudget {
                max_tokens: 100,
                compress_ratio: 0.5,
                keep_last_n,
            },
            ToolSelection::All,
        );
        s.messages = messages;
        s
    }

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    // ── counting ──────────────────────────────────────────────────────

    #[test]
    fn test_heuristic_counter() {
        assert_eq!(HeuristicCounter.count(""), 0);
        assert_eq!(HeuristicCounter.count("abc"), 1);
        assert_eq!(HeuristicCounter.count("abcd"), 1);
        assert_eq!(HeuristicCounter.count("abcde"), 2);
    }

    #[test]
    fn test_token_count_includes_tool_calls() {
        let s = state_with(
            2,
            vec![
                Message::user("one two"),
                Message::assistant_with_tools(
                    "three",
                    vec![ToolCall::new("c1", "read", r#"{"path": "x"}"#)],
                ),
            ],
        );
        // 2 + 1 + "read"(1) + args(2)
        assert_eq!(accountant().token_count(&s), 6);
    }

    #[test]
    fn test_should_compress_threshold_is_strict() {
        let s = state_with(2, vec![Message::user(&words(50))]);
        assert!(!accountant().should_compress(&s));
        let s = state_with(2, vec![Message::user(&words(51))]);
        assert!(accountant().should_compress(&s));
    }

    // ── split_point / transcript ──────────────────────────────────────

    #[test]
    fn test_split_point_never_orphans_tool_results() {
        let messages = vec![
            Message::user("q"),
            Message::assistant_with_tools("", vec![ToolCall::new("c1", "read", "{}")]),
            Message::tool_result("c1", "read", "data"),
            Message::assistant("done"),
        ];
        assert_eq!(split_point(&messages, 2), 1);
        assert_eq!(split_point(&messages, 1), 3);
        assert_eq!(split_point(&messages, 10), 0);
    }

    #[test]
    fn test_build_transcript_skips_tools_and_marks_calls() {
        let messages = vec![
            Message::user("read x"),
            Message::assistant_with_tools("", vec![ToolCall::new("c1", "read", "{\"secret\":1}")]),
            Message::tool_result("c1", "read", "payload"),
            Message::assistant_with_tools(
                "checking",
                vec![
                    ToolCall::new("c2", "grep", "{}"),
                    ToolCall::new("c3", "write", "{}"),
                ],
            ),
            Message::assistant(""),
            Message::assistant("all done"),
        ];
        assert_eq!(
            build_transcript(&messages),
            "User: read x\n\
             Assistant: [used tools: read]\n\
             Assistant: checking [used tools: grep, write]\n\
             Assistant: all done"
        );
    }

    // ── compress ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_compress_empty_history() {
        let mut s = state_with(2, vec![]);
        let report = accountant().compress(&mut s, None).await;
        assert_eq!(report.mode, CompressionMode::Empty);
        assert_eq!(report.message, "History is empty, nothing to compress.");
    }

    #[tokio::test]
    async fn test_compress_short_history_untouched() {
        let mut s = state_with(3, vec![Message::user("a"), Message::assistant("b")]);
        let report = accountant().compress(&mut s, None).await;
        assert_eq!(report.mode, CompressionMode::TooShort);
        assert_eq!(s.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_compress_with_summary_keeps_tail() {
        let mut s = state_with(
            2,
            vec![
                Message::user(&words(30)),
                Message::assistant(&words(30)),
                Message::user("latest question"),
                Message::assistant("latest answer"),
            ],
        );
        let provider = SummaryProvider::ok("talked about w");
        let report = accountant().compress(&mut s, Some(&provider)).await;

        assert_eq!(report.mode, CompressionMode::Summarized);
        assert_eq!(s.messages.len(), 3);
        assert!(s.messages[0].is_summary());
        assert_eq!(s.messages[0].content, "[history summary] talked about w");
        assert_eq!(s.messages[1].content, "latest question");
        assert_eq!(s.messages[2].content, "latest answer");
        assert!(report.tokens_after <= report.tokens_before);
        assert_eq!(
            report.message,
            format!(
                "Context compressed: {} -> {} tokens (kept last 2 messages, summarized 2 messages)",
                report.tokens_before, report.tokens_after
            )
        );

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0].content, SUMMARY_SYSTEM_PROMPT);
        assert!(seen[0][1].content.contains("User: w w"));
    }

    #[tokio::test]
    async fn test_compress_adds_skill_metadata() {
        let mut s = state_with(
            1,
            vec![Message::user(&words(20)), Message::assistant("ok")],
        );
        s.load_skill("review");
        let provider = SummaryProvider::ok("short");
        accountant().compress(&mut s, Some(&provider)).await;

        assert_eq!(s.messages.len(), 3);
        assert_eq!(s.messages[1].content, "[loaded skills] review");
        assert_eq!(s.messages[2].content, "ok");
    }

    #[tokio::test]
    async fn test_compress_without_provider_keeps_tail() {
        let mut s = state_with(
            1,
            vec![Message::user("old"), Message::assistant("new")],
        );
        let report = accountant().compress(&mut s, None).await;
        assert_eq!(report.mode, CompressionMode::TailOnly);
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].content, "new");
        assert!(report.message.contains("no model configured"));
    }

    #[tokio::test]
    async fn test_compress_failed_summary_keeps_tail() {
        let mut s = state_with(
            1,
            vec![Message::user("old"), Message::assistant("new")],
        );
        let report = accountant()
            .compress(&mut s, Some(&SummaryProvider::failing()))
            .await;
        assert_eq!(report.mode, CompressionMode::TailOnly);
        assert_eq!(s.messages.len(), 1);
        assert!(report.message.contains("503 upstream"));
    }

    #[tokio::test]
    async fn test_compress_never_grows_history() {
        let mut s = state_with(
            1,
            vec![Message::user("hi"), Message::assistant("yo")],
        );
        let before = accountant().token_count(&s);
        let provider = SummaryProvider::ok(&words(40));
        let report = accountant().compress(&mut s, Some(&provider)).await;
        assert_eq!(report.mode, CompressionMode::TailOnly);
        assert!(accountant().token_count(&s) <= before);
    }

    #[tokio::test]
    async fn test_compress_only_tool_prefix_drops_it() {
        let mut s = state_with(
            1,
            vec![
                Message::tool_result("c0", "read", "stale"),
                Message::assistant("answer"),
            ],
        );
        let provider = SummaryProvider::ok("unused");
        let report = accountant().compress(&mut s, Some(&provider)).await;
        assert_eq!(report.mode, CompressionMode::TailOnly);
        assert!(provider.seen.lock().unwrap().is_empty());
        assert_eq!(s.messages.len(), 1);
    }
}
