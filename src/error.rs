//! Error types for Parlance
//!
//! A single error enum covers the library. Most failure kinds in the
//! conversation core are recovered locally (tool failures become tool
//! messages, hook failures become hook results), so these errors mostly
//! surface from persistence, configuration and provider seams.

use thiserror::Error;

/// The primary error type for Parlance operations.
#[derive(Error, Debug)]
pub enum ParlanceError {
    /// Configuration-related errors (unreadable file, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors (API failures, empty completions, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session management errors (invalid state, persistence failures, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// Hook command errors (bad arguments, refused operations, etc.)
    #[error("Hook error: {0}")]
    Hook(String),

    /// Resource not found (sessions, tools, skills, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for Parlance operations.
pub type Result<T> = std::result::Result<T, ParlanceError>;
