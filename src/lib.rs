//! SiteForge - chat relay that lets a hosted model scaffold websites
//!
//! A browser posts a conversation to `POST /ai/chat`. The orchestrator hands
//! it to the model together with two tools, runs whatever the model asks for
//! on the host, feeds the results back, and repeats until the model answers
//! in plain text.
//!
//! # Modules
//!
//! - `agent` - the tool-calling loop and its system instruction
//! - `model` - provider-neutral conversation types and Gemini/Ollama clients
//! - `tools` - Command Executor, File Writer and the Tool Registry
//! - `security` - command policy and request rate limiting
//! - `server` - axum router for the chat endpoint
//! - `config` - CLI/env settings
//! - `metrics` - Prometheus metrics
//! - `telemetry` - tracing subscriber and optional OTLP export
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use siteforge::{AgentConfig, CommandPolicy, GeminiClient, Message, Orchestrator, ToolRegistry};
//!
//! let model = Arc::new(GeminiClient::new(base_url, api_key, "gemini-2.5-flash", timeout)?);
//! let tools = Arc::new(ToolRegistry::new(Arc::new(CommandPolicy::permissive("./sites"))));
//! let orchestrator = Orchestrator::new(model, tools, AgentConfig::default());
//!
//! let result = orchestrator.run(vec![Message::user("a pomodoro timer")]).await?;
//! println!("{}", result.final_response);
//! ```

pub mod agent;
pub mod config;
pub mod metrics;
pub mod model;
pub mod security;
pub mod server;
pub mod telemetry;
pub mod tools;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentError, AgentResult, Orchestrator, Platform, RunStatus};
pub use model::{GeminiClient, Message, ModelClient, ModelError, OllamaClient};
pub use security::{CommandPolicy, RateLimiter};
pub use tools::ToolRegistry;
