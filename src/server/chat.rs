//! `POST /ai/chat` payloads and handler

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use super::AppState;
use crate::agent::{AgentError, AgentResult, RunStatus, ToolRecord};
use crate::metrics::{CHAT_REQUESTS, ERRORS_TOTAL, REQUESTS_IN_FLIGHT};
use crate::model::{Message, Role};
use crate::tools::BuiltinTool;

/// One message as the browser sends it
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: Role,
    pub text: String,
}

/// Request body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
}

/// Response body on success
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// The model's final answer, or why the run stopped when incomplete
    pub message: String,
    /// "completed" or "incomplete"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Page sources written during the run, for the code preview
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<GeneratedFiles>,
    /// Deepest directory shared by every file written during the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_folder: Option<String>,
    pub iterations: usize,
    pub tool_calls: usize,
    pub trace_id: String,
    pub history: Vec<Message>,
}

impl From<AgentResult> for ChatResponse {
    fn from(result: AgentResult) -> Self {
        let (files, project_folder) = generated_files(&result.tool_calls);
        let (status, message, reason) = match result.status {
            RunStatus::Completed => ("completed", result.final_response, None),
            RunStatus::Incomplete(reason) => {
                ("incomplete", reason.to_string(), Some(reason.to_string()))
            }
        };

        Self {
            message,
            status,
            reason,
            files,
            project_folder,
            iterations: result.iterations,
            tool_calls: result.tool_calls.len(),
            trace_id: result.trace_id,
            history: result.history,
        }
    }
}

/// HTML, CSS and JS sources from successful `writeFile` calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedFiles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
}

impl GeneratedFiles {
    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.css.is_none() && self.js.is_none()
    }
}

/// Collect what the run wrote: the last page source of each kind and the
/// common parent directory of every written path
///
/// Failed writes are ignored. `None` when nothing qualifies.
pub fn generated_files(tool_calls: &[ToolRecord]) -> (Option<GeneratedFiles>, Option<String>) {
    let mut files = GeneratedFiles::default();
    let mut folder: Option<Vec<Component<'_>>> = None;

    let writes = tool_calls.iter().filter(|record| {
        record.call.name == BuiltinTool::WriteFile.name() && record.result.starts_with("Success:")
    });

    for record in writes {
        let (Some(path), Some(content)) = (record.call.str_arg("path"), record.call.str_arg("content"))
        else {
            continue;
        };
        let path = Path::new(path);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("html") | Some("htm") => files.html = Some(content.to_string()),
            Some("css") => files.css = Some(content.to_string()),
            Some("js") | Some("mjs") => files.js = Some(content.to_string()),
            _ => {}
        }

        let parent: Vec<Component<'_>> = path
            .parent()
            .map(|p| p.components().collect())
            .unwrap_or_default();
        folder = Some(match folder {
            None => parent,
            Some(shared) => shared
                .into_iter()
                .zip(parent)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    let project_folder = folder
        .filter(|components| !components.is_empty())
        .map(|components| {
            components
                .into_iter()
                .collect::<PathBuf>()
                .to_string_lossy()
                .into_owned()
        });

    ((!files.is_empty()).then_some(files), project_folder)
}

/// Errors surfaced as HTTP responses
#[derive(Debug)]
pub enum ServerError {
    /// Body could not be decoded or had no messages
    BadRequest(String),
    /// Rate limiter refused the request
    RateLimited(Duration),
    /// The orchestrator failed (model call error)
    Agent(AgentError),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ServerError::RateLimited(after) => {
                write!(f, "Rate limited, retry after {:.1}s", after.as_secs_f64())
            }
            ServerError::Agent(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<AgentError> for ServerError {
    fn from(e: AgentError) -> Self {
        ServerError::Agent(e)
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Bad request", "error": msg })),
            )
                .into_response(),
            ServerError::RateLimited(after) => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "message": "Too many requests",
                        "error": format!("Retry after {:.1}s", after.as_secs_f64()),
                    })),
                )
                    .into_response();
                let secs = after.as_secs_f64().ceil().max(1.0) as u64;
                if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            ServerError::Agent(AgentError::EmptyConversation) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "Bad request",
                    "error": AgentError::EmptyConversation.to_string(),
                })),
            )
                .into_response(),
            ServerError::Agent(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal server error", "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}

/// Handle one chat request: run the orchestrator over the posted history
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServerError> {
    let result = handle_chat(&state, payload).await;

    let status = match &result {
        Ok(_) => "200",
        Err(ServerError::BadRequest(_)) | Err(ServerError::Agent(AgentError::EmptyConversation)) => {
            "400"
        }
        Err(ServerError::RateLimited(_)) => "429",
        Err(ServerError::Agent(_)) => "500",
    };
    CHAT_REQUESTS.with_label_values(&[status]).inc();

    result
}

async fn handle_chat(
    state: &AppState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServerError> {
    if let Some(limiter) = &state.limiter {
        if let Err(e) = limiter.try_acquire() {
            warn!(retry_after = ?e.retry_after, "Chat request rate limited");
            ERRORS_TOTAL.with_label_values(&["rate_limited"]).inc();
            return Err(ServerError::RateLimited(e.retry_after));
        }
    }

    let Json(request) = payload?;
    let history: Vec<Message> = request
        .messages
        .into_iter()
        .map(|m| Message::text_with_role(m.role, m.text))
        .collect();

    info!(messages = history.len(), "Chat request received");

    let result = {
        let _in_flight = InFlight::enter();
        state.orchestrator.run(history).await
    };

    match result {
        Ok(result) => Ok(Json(ChatResponse::from(result))),
        Err(e) => {
            if let AgentError::Model(_) = &e {
                error!(error = %e, "Chat request failed");
                ERRORS_TOTAL.with_label_values(&["model_error"]).inc();
            }
            Err(e.into())
        }
    }
}

/// Holds `REQUESTS_IN_FLIGHT` up for as long as it lives, so a handler
/// future dropped mid-run still lowers the gauge
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        REQUESTS_IN_FLIGHT.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        REQUESTS_IN_FLIGHT.dec();
    }
}
