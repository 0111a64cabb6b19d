//! Tools module - invokable functions offered to the model
//!
//! - [`Tool`]: the trait a tool implements
//! - [`ToolSchema`]: derives a tool's parameter schema from Rust types
//! - [`ToolRegistry`]: name lookup, selection resolution and guarded execution
//! - [`ToolResult`]: outcome of one call, rendered into a tool message
//!
//! Concrete I/O tools (files, shell, search) live with the embedding
//! application; only [`EchoTool`] ships here, for wiring checks.
//!
//! # Example
//!
//! ```rust
//! use parlance::session::ToolSelection;
//! use parlance::tools::{EchoTool, ToolRegistry};
//!
//! let registry = ToolRegistry::from_tools(vec![Box::new(EchoTool)]);
//! let definitions = registry.definitions_for(&ToolSelection::All);
//! assert_eq!(definitions[0].name, "echo");
//! assert!(registry.definitions_for(&ToolSelection::None).is_empty());
//! ```

mod registry;
mod types;

pub use registry::ToolRegistry;
pub use types::{SchemaType, Tool, ToolContext, ToolResult, ToolSchema};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Echoes its `message` argument back.
///
/// ```rust
/// use parlance::tools::{EchoTool, Tool, ToolContext};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let result = EchoTool.execute(json!({"message": "Hello"}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap(), "Hello");
/// # });
/// ```
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        ToolSchema::new()
            .param::<Option<String>>("message", "The message to echo back")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        Ok(args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)")
            .to_string())
    }
}
