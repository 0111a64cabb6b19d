//! Tool registry for Parlance
//!
//! `ToolRegistry` maps tool names to implementations. The composition root
//! builds it from an explicit list; nothing registers itself. Lookups are
//! case-insensitive and iteration order is alphabetical, so the tool list
//! offered to the model is stable between requests.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::providers::ToolDefinition;
use crate::session::{ToolCall, ToolSelection};
use crate::utils::panic::catch_panic;

use super::{Tool, ToolContext, ToolResult};

/// A registry that holds and executes tools.
///
/// # Example
///
/// ```rust
/// use parlance::tools::{EchoTool, ToolContext, ToolRegistry};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let registry = ToolRegistry::from_tools(vec![Box::new(EchoTool)]);
/// assert!(registry.has("ECHO"));
///
/// let result = registry
///     .execute("echo", json!({"message": "hello"}), &ToolContext::default())
///     .await;
/// assert!(result.success);
/// assert_eq!(result.result.as_deref(), Some("hello"));
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Build a registry from an explicit list of tools.
    pub fn from_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool, replacing any tool with the same (case-folded) name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_lowercase();
        info!(tool = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Remove a tool. Returns `true` if it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(&name.to_lowercase()).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(&name.to_lowercase()).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|k| k.as_str()).collect()
    }

    /// Tools a session selection resolves to.
    ///
    /// `All` expands to every tool, `None` yields nothing, and a named list is
    /// filtered against the registry with unknown names silently dropped.
    pub fn resolve(&self, selection: &ToolSelection) -> Vec<&dyn Tool> {
        match selection {
            ToolSelection::All => self.tools.values().map(|t| t.as_ref()).collect(),
            ToolSelection::None => Vec::new(),
            ToolSelection::Named(names) => {
                let mut seen = Vec::new();
                let mut tools = Vec::new();
                for name in names {
                    let key = name.to_lowercase();
                    if seen.contains(&key) {
                        continue;
                    }
                    if let Some(tool) = self.tools.get(&key) {
                        tools.push(tool.as_ref());
                    }
                    seen.push(key);
                }
                tools
            }
        }
    }

    /// Definitions for every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions_for(&ToolSelection::All)
    }

    /// Definitions for the tools a session selection resolves to.
    pub fn definitions_for(&self, selection: &ToolSelection) -> Vec<ToolDefinition> {
        self.resolve(selection)
            .into_iter()
            .map(|t| ToolDefinition::new(&t.name().to_lowercase(), t.description(), t.parameters()))
            .collect()
    }

    /// Execute a tool with already-parsed arguments.
    ///
    /// Never fails: a missing tool, an `Err` from the tool and a panic inside
    /// it all come back as a failed `ToolResult`.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let key = name.to_lowercase();
        let Some(tool) = self.tools.get(&key) else {
            error!(tool = %name, "Tool not found");
            let available = self.names().join(", ");
            return ToolResult::failure(
                name,
                args,
                format!("Tool '{}' not found. Available: {}", name, available),
            );
        };

        let start = Instant::now();
        let outcome = catch_panic(tool.execute(args.clone(), ctx)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(output)) => {
                info!(tool = %key, duration_ms, "Tool executed successfully");
                ToolResult::ok(&key, args, output)
            }
            Ok(Err(e)) => {
                warn!(tool = %key, duration_ms, error = %e, "Tool execution failed");
                ToolResult::failure(&key, args, e.to_string())
            }
            Err(panic) => {
                error!(tool = %key, duration_ms, panic = %panic, "Tool panicked");
                ToolResult::failure(&key, args, format!("tool panicked: {}", panic))
            }
        }
    }

    /// Execute a model-issued call whose arguments are still a JSON string.
    ///
    /// Arguments that do not parse are reported back to the model without
    /// running the tool. An empty argument string counts as `{}`.
    pub async fn execute_call(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let raw = call.arguments.trim();
        let args = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(args) => args,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Invalid JSON in tool arguments");
                    return ToolResult::failure(
                        &call.name,
                        Value::String(call.arguments.clone()),
                        format!("Invalid arguments JSON: {}", e),
                    );
                }
            }
        };
        self.execute(&call.name, args, ctx).await
    }
}
