//! Agent module for model-driven site generation
//!
//! # Architecture
//!
//! ```text
//! chat messages → Orchestrator → ModelClient (history + tools)
//!                      ↓
//!           Tool call: executeCommand / writeFile
//!                      ↓
//!           ToolRegistry → CommandExecutor | FileWriter
//!                      ↓
//!           "Success: ..." / "Error: ..." appended to history
//!                      ↓
//!           Back to the model → loop, or plain text → done
//! ```

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{
    AgentConfig, AgentError, AgentResult, IncompleteReason, Orchestrator, RunStatus, ToolRecord,
};
pub use prompt::{system_instruction, Platform};
