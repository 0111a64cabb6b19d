//! Tool types for Parlance
//!
//! The `Tool` trait every tool implements, the context handed to tools, the
//! `ToolResult` the loop turns into tool messages, and `ToolSchema`, which
//! derives a JSON-Schema parameter object from Rust types.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::Result;

/// Trait that all tools must implement.
///
/// Returning `Err` (or panicking) is not fatal: the registry converts it
/// into a failed [`ToolResult`] that the model sees as a normal tool message.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use parlance::error::Result;
/// use parlance::tools::{Tool, ToolContext, ToolSchema};
///
/// struct Shout;
///
/// #[async_trait]
/// impl Tool for Shout {
///     fn name(&self) -> &str { "shout" }
///     fn description(&self) -> &str { "Upper-case a string" }
///     fn parameters(&self) -> Value {
///         ToolSchema::new().param::<String>("text", "Text to shout").build()
///     }
///     async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
///         Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name. The registry matches it case-insensitively.
    fn name(&self) -> &str;

    /// Description sent to the model.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with parsed JSON arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Session the call belongs to
    pub session_id: Option<String>,
    /// Working directory for file operations
    pub workspace: Option<String>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub tool_name: String,
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_name: &str, arguments: Value, result: impl Into<String>) -> Self {
        Self {
            success: true,
            tool_name: tool_name.to_string(),
            arguments,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn failure(tool_name: &str, arguments: Value, error: impl Into<String>) -> Self {
        Self {
            success: false,
            tool_name: tool_name.to_string(),
            arguments,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Text placed in the tool message the model reads.
    ///
    /// # Example
    /// ```
    /// use parlance::tools::ToolResult;
    /// use serde_json::json;
    ///
    /// let r = ToolResult::failure("read", json!({"path": "x"}), "No such file: x");
    /// assert_eq!(
    ///     r.to_display_string(),
    ///     "[Tool: read]\nArguments: {\"path\":\"x\"}\nError: No such file: x"
    /// );
    /// ```
    pub fn to_display_string(&self) -> String {
        let mut out = format!("[Tool: {}]\nArguments: {}\n", self.tool_name, self.arguments);
        if self.success {
            out.push_str("Result:\n");
            out.push_str(self.result.as_deref().unwrap_or(""));
        } else {
            out.push_str("Error: ");
            out.push_str(self.error.as_deref().unwrap_or("unknown error"));
        }
        out
    }
}

// ---- parameter schema reflection ----

/// Maps a Rust type onto a JSON-Schema fragment.
///
/// `Option<T>` reuses `T`'s schema and marks the parameter as not required.
pub trait SchemaType {
    fn schema() -> Value;

    fn required() -> bool {
        true
    }
}

macro_rules! schema_type {
    ($kind:literal => $($ty:ty),+) => {
        $(
            impl SchemaType for $ty {
                fn schema() -> Value {
                    json!({ "type": $kind })
                }
            }
        )+
    };
}

schema_type!("string" => String, &str, char);
schema_type!("integer" => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
schema_type!("number" => f32, f64);
schema_type!("boolean" => bool);
schema_type!("object" => Map<String, Value>, Value);

impl<T: SchemaType> SchemaType for Vec<T> {
    fn schema() -> Value {
        json!({ "type": "array", "items": T::schema() })
    }
}

impl<T: SchemaType> SchemaType for HashMap<String, T> {
    fn schema() -> Value {
        json!({ "type": "object", "additionalProperties": T::schema() })
    }
}

impl<T: SchemaType> SchemaType for BTreeMap<String, T> {
    fn schema() -> Value {
        json!({ "type": "object", "additionalProperties": T::schema() })
    }
}

impl<T: SchemaType> SchemaType for Option<T> {
    fn schema() -> Value {
        T::schema()
    }

    fn required() -> bool {
        false
    }
}

/// Builder for a tool's `{type: object, properties, required}` schema.
///
/// # Example
/// ```
/// use parlance::tools::ToolSchema;
///
/// let schema = ToolSchema::new()
///     .param::<String>("path", "File to read")
///     .param::<Option<u64>>("limit", "Maximum lines")
///     .build();
/// assert_eq!(schema["properties"]["path"]["type"], "string");
/// assert_eq!(schema["properties"]["limit"]["type"], "integer");
/// assert_eq!(schema["required"], serde_json::json!(["path"]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter whose schema is derived from `T`.
    pub fn param<T: SchemaType>(mut self, name: &str, description: &str) -> Self {
        let mut schema = T::schema();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("description".to_string(), json!(description));
        }
        self.properties.insert(name.to_string(), schema);
        if T::required() {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        })
    }
}
