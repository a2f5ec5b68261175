//! Model provider integration
//!
//! The orchestrator only talks to [`ModelClient`]. Each provider adapter
//! translates the shared conversation types to its own wire format:
//!
//! ```text
//! Orchestrator ──ModelRequest──► ModelClient
//!                                   ├── GeminiClient  (generateContent)
//!                                   └── OllamaClient  (/api/chat)
//!              ◄──ModelReply─────────┘
//! ```

pub mod gemini;
pub mod ollama;
pub mod types;

use async_trait::async_trait;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use types::{
    FunctionCall, FunctionResponse, FunctionResult, Message, ModelReply, ModelRequest, Part,
    Role, ToolDeclaration,
};

/// A hosted or local model that supports function calling
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model name, used for log fields and metric labels
    fn model_name(&self) -> &str;

    /// Send the full conversation and return the model's next turn
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError>;
}

/// Error type for model calls
#[derive(Debug)]
pub enum ModelError {
    /// Transport failure talking to the provider
    Request(reqwest::Error),
    /// Provider returned something we could not decode
    Parse(serde_json::Error),
    /// Provider answered with a non-success status
    Api { status: u16, message: String },
    /// Provider returned no candidates at all
    EmptyResponse,
    /// A candidate came back without content (blocked, max tokens, ...)
    NoContent { finish_reason: Option<String> },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Request(e) => write!(f, "Request error: {}", e),
            ModelError::Parse(e) => write!(f, "Parse error: {}", e),
            ModelError::Api { status, message } => {
                write!(f, "Provider returned {}: {}", status, message)
            }
            ModelError::EmptyResponse => write!(f, "Empty response from model"),
            ModelError::NoContent { finish_reason } => match finish_reason {
                Some(reason) => write!(f, "Model returned no content (finish reason: {})", reason),
                None => write!(f, "Model returned no content"),
            },
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Request(e) => Some(e),
            ModelError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::Request(e)
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Parse(e)
    }
}

/// Pull a readable message out of a provider error body
///
/// Both Gemini (`{"error": {"message": ...}}`) and Ollama (`{"error": "..."}`)
/// wrap the reason in an `error` field. Fall back to the raw body.
pub(crate) fn api_error(status: u16, body: &str) -> ModelError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let err = v.get("error")?;
            err.get("message")
                .and_then(|m| m.as_str())
                .or_else(|| err.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string());

    ModelError::Api { status, message }
}
