//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use siteforge::agent::{AgentConfig, Orchestrator, Platform};
use siteforge::model::{
    FunctionCall, Message, ModelClient, ModelError, ModelReply, ModelRequest,
};
use siteforge::security::CommandPolicy;
use siteforge::tools::ToolRegistry;

/// One scripted model turn
pub enum Step {
    Reply(ModelReply),
    Fail(u16, &'static str),
    /// Sleep before replying, to exercise deadlines
    Slow(Duration, ModelReply),
}

/// Model stub that replays a script and records every request it saw
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Histories passed to each model call, in order
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        assert!(!request.system_instruction.is_empty());
        assert_eq!(request.tools.len(), 2);
        self.seen.lock().unwrap().push(request.history.to_vec());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(status, message)) => Err(ModelError::Api {
                status,
                message: message.to_string(),
            }),
            Some(Step::Slow(delay, reply)) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            None => Err(ModelError::EmptyResponse),
        }
    }
}

/// Model that asks for the same command forever
pub struct EndlessModel;

#[async_trait]
impl ModelClient for EndlessModel {
    fn model_name(&self) -> &str {
        "endless"
    }

    async fn generate(&self, _request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        Ok(ModelReply::call(command_call("echo again")))
    }
}

pub fn command_call(command: &str) -> FunctionCall {
    FunctionCall::new("executeCommand", json!({ "command": command }))
}

pub fn write_call(path: &str, content: &str) -> FunctionCall {
    FunctionCall::new("writeFile", json!({ "path": path, "content": content }))
}

pub fn orchestrator(
    model: Arc<dyn ModelClient>,
    workspace: &Path,
    config: AgentConfig,
) -> Orchestrator {
    let tools = Arc::new(ToolRegistry::new(Arc::new(CommandPolicy::permissive(
        workspace,
    ))));
    Orchestrator::new(model, tools, config)
}

pub fn linux_config() -> AgentConfig {
    AgentConfig {
        platform: Platform::Linux,
        ..AgentConfig::default()
    }
}

/// A call message must be followed directly by its result message
pub fn assert_no_dangling_calls(history: &[Message]) {
    for (i, msg) in history.iter().enumerate() {
        if let Some(call) = msg.as_function_call() {
            let next = history
                .get(i + 1)
                .unwrap_or_else(|| panic!("call {} at index {} has no result", call.name, i));
            let response = next
                .as_function_response()
                .unwrap_or_else(|| panic!("call {} at index {} not followed by a result", call.name, i));
            assert_eq!(response.name, call.name);
        }
    }
}
