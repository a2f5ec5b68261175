//! Ollama `/api/chat` client with tool calling
//!
//! Lets the relay drive a local model instead of a hosted one. The shared
//! Gemini-shaped history is translated into Ollama's OpenAI-like messages:
//!
//! ```text
//! user text          → {"role": "user", "content": ...}
//! model text         → {"role": "assistant", "content": ...}
//! model functionCall → {"role": "assistant", "tool_calls": [...]}
//! functionResponse   → {"role": "tool", "content": result}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::types::{FunctionCall, Message, ModelReply, ModelRequest, Part, Role, ToolDeclaration};
use super::{api_error, ModelClient, ModelError};

/// Default local Ollama endpoint
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// A message in Ollama's chat format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    #[serde(default)]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// A tool call from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: OllamaFunctionCall,
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolDeclaration,
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
}

/// Client for Ollama's /api/chat endpoint with tool support
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new chat client
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let endpoint = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let messages = to_chat_messages(request.system_instruction, request.history);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": 0.0
            }
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::to_value(to_ollama_tools(request.tools))?;
        }

        debug!(model = %self.model, messages = messages.len(), "Sending chat request");

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)?;
        Ok(to_model_reply(chat_response.message))
    }
}

/// Translate the shared history into Ollama chat messages
pub(crate) fn to_chat_messages(system_instruction: &str, history: &[Message]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system_instruction.is_empty() {
        messages.push(ChatMessage::new("system", system_instruction));
    }

    for message in history {
        for part in &message.parts {
            let translated = match (message.role, part) {
                (Role::User, Part::Text(text)) => ChatMessage::new("user", text.as_str()),
                (Role::Model, Part::Text(text)) => ChatMessage::new("assistant", text.as_str()),
                (_, Part::FunctionCall(call)) => ChatMessage {
                    role: "assistant".to_string(),
                    content: String::new(),
                    tool_calls: Some(vec![ToolCall {
                        function: OllamaFunctionCall {
                            name: call.name.clone(),
                            arguments: call.args.clone(),
                        },
                    }]),
                },
                (_, Part::FunctionResponse(response)) => {
                    ChatMessage::new("tool", response.response.result.as_str())
                }
            };
            messages.push(translated);
        }
    }

    messages
}

/// Wrap declarations in Ollama's `{"type": "function", ...}` envelope
///
/// Declarations use Gemini's uppercase type names; JSON schema wants lowercase.
pub(crate) fn to_ollama_tools(declarations: &[ToolDeclaration]) -> Vec<Tool> {
    declarations
        .iter()
        .map(|decl| Tool {
            tool_type: "function".to_string(),
            function: ToolDeclaration {
                name: decl.name.clone(),
                description: decl.description.clone(),
                parameters: lowercase_schema_types(&decl.parameters),
            },
        })
        .collect()
}

fn lowercase_schema_types(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("type", Value::String(t)) => Value::String(t.to_lowercase()),
                        _ => lowercase_schema_types(value),
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(lowercase_schema_types).collect()),
        other => other.clone(),
    }
}

/// Reduce an assistant message to a reply, trying native tool calls first and
/// then JSON embedded in the text
pub(crate) fn to_model_reply(message: ChatMessage) -> ModelReply {
    let native: Vec<FunctionCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| FunctionCall::new(tc.function.name, normalize_arguments(tc.function.arguments)))
        .collect();

    let function_calls = if native.is_empty() {
        parse_tool_calls_from_text(&message.content)
    } else {
        native
    };

    ModelReply {
        function_calls,
        text: message.content,
    }
}

/// Some models send arguments as a JSON-encoded string rather than an object
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    }
}

/// Try to parse tool calls from the response content text
///
/// Small local models often print `{"name": ..., "arguments": {...}}` instead
/// of using the native tool_calls field.
pub fn parse_tool_calls_from_text(content: &str) -> Vec<FunctionCall> {
    let content = content.trim();

    if let Some(call) = try_parse_tool_call(content) {
        return vec![call];
    }

    let mut calls = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Some(call) = try_parse_tool_call(&content[s..=i]) {
                            calls.push(call);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    calls
}

fn try_parse_tool_call(json_str: &str) -> Option<FunctionCall> {
    let value = serde_json::from_str::<Value>(json_str).ok()?;
    let name = value.get("name").and_then(|n| n.as_str())?;

    // Some models use "parameters" instead of "arguments"
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))?
        .clone();

    Some(FunctionCall::new(name, normalize_arguments(arguments)))
}
