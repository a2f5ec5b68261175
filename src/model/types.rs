//! Conversation types shared by the orchestrator and every provider adapter
//!
//! The wire shape follows Gemini's `contents` array, since that is what the
//! chat endpoint accepts and returns. Other providers translate at the edge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// The assistant. Browser clients sometimes send "assistant", so accept it.
    #[serde(alias = "assistant")]
    Model,
}

/// A tool call emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default = "empty_args")]
    pub args: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Read a string argument, `None` if it is missing or not a string
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Payload of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub result: String,
}

/// The result of running a tool, addressed back to the call by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: FunctionResult,
}

/// One part of a message
///
/// Serializes as a single-key object: `{"text": ...}`, `{"functionCall": ...}`
/// or `{"functionResponse": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

/// A message in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn text_with_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Model-role message recording a tool call
    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::FunctionCall(call)],
        }
    }

    /// User-role message carrying a tool's textual result
    pub fn function_response(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::FunctionResponse(FunctionResponse {
                name: name.into(),
                response: FunctionResult {
                    result: result.into(),
                },
            })],
        }
    }

    /// Concatenated text parts, `None` if the message has no text
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        self.parts.iter().find_map(|p| match p {
            Part::FunctionCall(c) => Some(c),
            _ => None,
        })
    }

    pub fn as_function_response(&self) -> Option<&FunctionResponse> {
        self.parts.iter().find_map(|p| match p {
            Part::FunctionResponse(r) => Some(r),
            _ => None,
        })
    }
}

/// Schema advertised to the model for one callable tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Everything a provider needs for one turn
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub history: &'a [Message],
    pub system_instruction: &'a str,
    pub tools: &'a [ToolDeclaration],
}

/// A provider's reply, reduced to what the loop cares about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    /// Tool calls in the order the model emitted them
    pub function_calls: Vec<FunctionCall>,
    /// Concatenated text parts
    pub text: String,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            function_calls: Vec::new(),
            text: text.into(),
        }
    }

    pub fn call(call: FunctionCall) -> Self {
        Self {
            function_calls: vec![call],
            text: String::new(),
        }
    }
}
