//! Google Gemini `generateContent` client with function calling
//!
//! History is already in Gemini's `contents` shape, so the request body is a
//! pass-through plus the system instruction and the function declarations.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::types::{FunctionCall, ModelReply, ModelRequest};
use super::{api_error, ModelClient, ModelError};

/// Public Generative Language API endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model the chat endpoint uses unless configured otherwise
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Client for Gemini's generateContent endpoint
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Arguments
    /// * `base_url` - API root, usually [`DEFAULT_GEMINI_BASE_URL`]
    /// * `api_key` - Key sent in the `x-goog-api-key` header
    /// * `model` - Model name (e.g., "gemini-2.5-flash")
    /// * `timeout` - Per-request timeout for the HTTP call
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'), self.model
        )
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let body = build_request_body(&request)?;

        debug!(
            model = %self.model,
            messages = request.history.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        parse_response(parsed)
    }
}

/// Build the JSON body for generateContent
pub(crate) fn build_request_body(request: &ModelRequest<'_>) -> Result<Value, ModelError> {
    let mut body = json!({
        "contents": serde_json::to_value(request.history)?,
        "systemInstruction": {
            "parts": [{ "text": request.system_instruction }]
        },
    });

    if !request.tools.is_empty() {
        body["tools"] = json!([{
            "functionDeclarations": serde_json::to_value(request.tools)?
        }]);
    }

    Ok(body)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RawPart>,
}

/// Response parts can carry extra keys (e.g. `thoughtSignature`) next to the
/// payload, so they are decoded leniently instead of through [`super::Part`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    text: Option<String>,
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought: bool,
}

/// Reduce the first candidate to its function calls and visible text
pub(crate) fn parse_response(response: GenerateContentResponse) -> Result<ModelReply, ModelError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ModelError::EmptyResponse)?;

    let parts = match candidate.content {
        Some(content) if !content.parts.is_empty() => content.parts,
        _ => {
            return Err(ModelError::NoContent {
                finish_reason: candidate.finish_reason,
            })
        }
    };

    let mut reply = ModelReply::default();
    for part in parts {
        if let Some(call) = part.function_call {
            reply.function_calls.push(call);
        } else if let Some(text) = part.text {
            if !part.thought {
                reply.text.push_str(&text);
            }
        }
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{Message, ToolDeclaration};

    fn parse(value: Value) -> Result<ModelReply, ModelError> {
        parse_response(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_request_body_shape() {
        let history = vec![Message::user("make a todo app")];
        let tools = vec![ToolDeclaration {
            name: "executeCommand".to_string(),
            description: "Run a command".to_string(),
            parameters: json!({"type": "OBJECT"}),
        }];
        let request = ModelRequest {
            history: &history,
            system_instruction: "be helpful",
            tools: &tools,
        };

        let body = build_request_body(&request).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "make a todo app");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "executeCommand"
        );
    }

    #[test]
    fn test_request_body_without_tools() {
        let history = vec![Message::user("hi")];
        let request = ModelRequest {
            history: &history,
            system_instruction: "",
            tools: &[],
        };
        let body = build_request_body(&request).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_function_call() {
        let reply = parse(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {"name": "executeCommand", "args": {"command": "mkdir todo"}},
                        "thoughtSignature": "abc123"
                    }]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(reply.function_calls.len(), 1);
        assert_eq!(reply.function_calls[0].name, "executeCommand");
        assert_eq!(reply.function_calls[0].str_arg("command"), Some("mkdir todo"));
    }

    #[test]
    fn test_parse_text_skips_thoughts() {
        let reply = parse(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking about it", "thought": true},
                        {"text": "Created "},
                        {"text": "the site."}
                    ]
                }
            }]
        }))
        .unwrap();

        assert!(reply.function_calls.is_empty());
        assert_eq!(reply.text, "Created the site.");
    }

    #[test]
    fn test_parse_no_candidates() {
        let err = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap_err();
        assert!(matches!(err, ModelError::EmptyResponse));
    }

    #[test]
    fn test_parse_candidate_without_content() {
        let err = parse(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap_err();
        match err {
            ModelError::NoContent { finish_reason } => {
                assert_eq!(finish_reason.as_deref(), Some("SAFETY"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(
            "http://localhost:8080/",
            "key",
            "gemini-2.5-flash",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
