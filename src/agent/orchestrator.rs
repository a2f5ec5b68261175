//! Conversation Orchestrator - the tool-calling loop
//!
//! Drives the model through PLAN → EXECUTE → VALIDATE → REPEAT until it
//! answers with plain text, servicing one tool call per model turn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::prompt::{system_instruction, Platform};
use crate::metrics::{AGENT_ITERATIONS, AGENT_RUNS, MODEL_CALL_DURATION};
use crate::model::{FunctionCall, Message, ModelClient, ModelError, ModelRequest};
use crate::tools::ToolRegistry;

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of model calls before giving up
    pub max_iterations: usize,
    /// Wall-clock budget for a whole run
    pub deadline: Option<Duration>,
    /// Operating system the model should write commands for
    pub platform: Platform,
    /// Custom system instruction (rendered default if None)
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            deadline: None,
            platform: Platform::host(),
            system_prompt: None,
        }
    }
}

/// Why a run stopped before the model gave a final answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteReason {
    /// `max_iterations` model calls were made
    MaxIterations(usize),
    /// The run's deadline passed
    DeadlineExceeded(Duration),
}

impl std::fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncompleteReason::MaxIterations(n) => {
                write!(f, "Stopped after {} model calls without a final answer", n)
            }
            IncompleteReason::DeadlineExceeded(d) => {
                write!(f, "Stopped after exceeding the {:.0}s deadline", d.as_secs_f64())
            }
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Incomplete(IncompleteReason),
}

/// Record of one serviced tool call
#[derive(Debug, Clone)]
pub struct ToolRecord {
    pub call: FunctionCall,
    pub result: String,
    pub duration_ms: f64,
}

/// Result of an orchestrator run
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Final text from the model; empty when the run is incomplete
    pub final_response: String,
    pub status: RunStatus,
    /// Full conversation including the caller's messages
    pub history: Vec<Message>,
    /// Number of model calls made
    pub iterations: usize,
    /// Every tool call serviced, in order
    pub tool_calls: Vec<ToolRecord>,
    /// Unique ID for correlating logs of this run
    pub trace_id: String,
}

impl AgentResult {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Error type for orchestrator runs
#[derive(Debug)]
pub enum AgentError {
    /// The caller supplied no messages
    EmptyConversation,
    /// The model call failed; tool failures never end up here
    Model(ModelError),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::EmptyConversation => write!(f, "Conversation has no messages"),
            AgentError::Model(e) => write!(f, "Model error: {}", e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ModelError> for AgentError {
    fn from(e: ModelError) -> Self {
        AgentError::Model(e)
    }
}

/// Loop states
///
/// ```text
///        ┌──────────────── tool result appended ───────────────┐
///        ▼                                                     │
/// AwaitingModel ──reply has a call──► DispatchingTool ─────────┘
///        │
///        └──reply is text──► Done
/// ```
enum LoopState {
    AwaitingModel,
    DispatchingTool(FunctionCall),
    Done(String),
}

/// Orchestrator coordinating model calls and tool dispatch
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    system_instruction: String,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    /// * `model` - Provider client used for every turn
    /// * `tools` - Registry whose declarations are advertised and dispatched
    /// * `config` - Iteration bounds, platform and prompt override
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        let system_instruction = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| system_instruction(config.platform));

        Self {
            model,
            tools,
            config,
            system_instruction,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Run the loop over a caller-supplied conversation
    ///
    /// Returns `Ok` with an incomplete status when a bound is hit. Only model
    /// failures are errors.
    pub async fn run(&self, history: Vec<Message>) -> Result<AgentResult, AgentError> {
        if history.is_empty() {
            return Err(AgentError::EmptyConversation);
        }

        let trace_id = Uuid::now_v7().to_string();
        let root_span = info_span!(
            "agent_run",
            trace_id = %trace_id,
            model = %self.model.model_name(),
            otel.name = "agent_run"
        );

        let result = self.run_loop(history, trace_id).instrument(root_span).await;

        match &result {
            Ok(r) if r.is_complete() => AGENT_RUNS.with_label_values(&["completed"]).inc(),
            Ok(_) => AGENT_RUNS.with_label_values(&["incomplete"]).inc(),
            Err(_) => AGENT_RUNS.with_label_values(&["error"]).inc(),
        }
        if let Ok(r) = &result {
            AGENT_ITERATIONS.observe(r.iterations as f64);
        }

        result
    }

    async fn run_loop(
        &self,
        mut history: Vec<Message>,
        trace_id: String,
    ) -> Result<AgentResult, AgentError> {
        info!(messages = history.len(), "Starting agent run");

        let started = Instant::now();
        let mut iterations = 0;
        let mut tool_calls: Vec<ToolRecord> = Vec::new();
        let mut state = LoopState::AwaitingModel;

        let incomplete = |history: Vec<Message>,
                          iterations: usize,
                          tool_calls: Vec<ToolRecord>,
                          reason: IncompleteReason| {
            warn!(iterations, reason = %reason, "Agent run incomplete");
            AgentResult {
                final_response: String::new(),
                status: RunStatus::Incomplete(reason),
                history,
                iterations,
                tool_calls,
                trace_id: trace_id.clone(),
            }
        };

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.config.max_iterations {
                        return Ok(incomplete(
                            history,
                            iterations,
                            tool_calls,
                            IncompleteReason::MaxIterations(iterations),
                        ));
                    }

                    let remaining = match self.config.deadline {
                        Some(deadline) => match deadline.checked_sub(started.elapsed()) {
                            Some(left) if !left.is_zero() => Some(left),
                            _ => {
                                return Ok(incomplete(
                                    history,
                                    iterations,
                                    tool_calls,
                                    IncompleteReason::DeadlineExceeded(deadline),
                                ))
                            }
                        },
                        None => None,
                    };

                    iterations += 1;
                    let request = ModelRequest {
                        history: &history,
                        system_instruction: &self.system_instruction,
                        tools: self.tools.declarations(),
                    };

                    let llm_span = info_span!("llm_call", iteration = iterations, otel.name = "llm_call");
                    let call_start = Instant::now();
                    let generation = self.model.generate(request).instrument(llm_span);

                    let outcome = match remaining {
                        Some(left) => tokio::time::timeout(left, generation).await.ok(),
                        None => Some(generation.await),
                    };
                    let reply = match outcome {
                        Some(reply) => reply?,
                        None => {
                            return Ok(incomplete(
                                history,
                                iterations,
                                tool_calls,
                                IncompleteReason::DeadlineExceeded(
                                    self.config.deadline.unwrap_or_default(),
                                ),
                            ))
                        }
                    };

                    let elapsed = call_start.elapsed();
                    MODEL_CALL_DURATION
                        .with_label_values(&[self.model.model_name()])
                        .observe(elapsed.as_secs_f64());
                    debug!(
                        iteration = iterations,
                        duration_ms = elapsed.as_secs_f64() * 1000.0,
                        calls = reply.function_calls.len(),
                        "Model call completed"
                    );

                    if reply.function_calls.len() > 1 {
                        warn!(
                            count = reply.function_calls.len(),
                            "Model returned several tool calls; servicing the first only"
                        );
                    }

                    match reply.function_calls.into_iter().next() {
                        Some(call) => LoopState::DispatchingTool(call),
                        None => LoopState::Done(reply.text),
                    }
                }

                LoopState::DispatchingTool(call) => {
                    info!(tool = %call.name, iteration = iterations, "Dispatching tool call");
                    let start = Instant::now();
                    let result = self.tools.dispatch(&call).await;
                    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

                    debug!(tool = %call.name, duration_ms, result = %preview(&result), "Tool finished");

                    // call and result go in together so the next turn never
                    // sees a dangling call
                    history.push(Message::function_call(call.clone()));
                    history.push(Message::function_response(call.name.clone(), result.clone()));

                    tool_calls.push(ToolRecord {
                        call,
                        result,
                        duration_ms,
                    });
                    LoopState::AwaitingModel
                }

                LoopState::Done(text) => {
                    info!(iterations, tool_calls = tool_calls.len(), "Agent run completed");
                    history.push(Message::model(text.clone()));

                    return Ok(AgentResult {
                        final_response: text,
                        status: RunStatus::Completed,
                        history,
                        iterations,
                        tool_calls,
                        trace_id: trace_id.clone(),
                    });
                }
            };
        }
    }
}

fn preview(text: &str) -> &str {
    const MAX: usize = 200;
    if text.len() <= MAX {
        return text;
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
