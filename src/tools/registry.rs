//! Tool Registry - the fixed set of tools the model may call
//!
//! Adding a tool means adding a [`BuiltinTool`] variant, its declaration and
//! a dispatch arm. There is no runtime registration.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{info_span, warn, Instrument};

use super::{CommandExecutor, FileWriter};
use crate::metrics::{TOOL_CALLS, TOOL_DURATION};
use crate::model::{FunctionCall, ToolDeclaration};
use crate::security::CommandPolicy;

/// The tools this relay exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    ExecuteCommand,
    WriteFile,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 2] = [BuiltinTool::ExecuteCommand, BuiltinTool::WriteFile];

    /// Name the model uses to call the tool
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTool::ExecuteCommand => "executeCommand",
            BuiltinTool::WriteFile => "writeFile",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Schema advertised to the model
    pub fn declaration(&self) -> ToolDeclaration {
        match self {
            BuiltinTool::ExecuteCommand => ToolDeclaration {
                name: self.name().to_string(),
                description: "Execute a single terminal/shell command. A command can create a \
                              folder or file, write to a file, edit a file or delete a file."
                    .to_string(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {
                        "command": {
                            "type": "STRING",
                            "description": "A single terminal command. Ex: \"mkdir calculator\""
                        }
                    },
                    "required": ["command"]
                }),
            },
            BuiltinTool::WriteFile => ToolDeclaration {
                name: self.name().to_string(),
                description: "Write content to a file directly, creating parent folders and \
                              replacing any existing content."
                    .to_string(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {
                        "path": {
                            "type": "STRING",
                            "description": "Path to the file"
                        },
                        "content": {
                            "type": "STRING",
                            "description": "Content to write to the file"
                        }
                    },
                    "required": ["path", "content"]
                }),
            },
        }
    }
}

/// Maps tool names to implementations and holds the advertised schemas
pub struct ToolRegistry {
    executor: CommandExecutor,
    writer: FileWriter,
    declarations: Vec<ToolDeclaration>,
}

impl ToolRegistry {
    pub fn new(policy: Arc<CommandPolicy>) -> Self {
        Self {
            executor: CommandExecutor::new(policy.clone()),
            writer: FileWriter::new(policy),
            declarations: BuiltinTool::ALL.iter().map(|t| t.declaration()).collect(),
        }
    }

    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    /// Run a tool call and return its textual result
    ///
    /// Never fails: unknown tools and bad arguments come back as `Error:`
    /// text so the model can correct itself.
    pub async fn dispatch(&self, call: &FunctionCall) -> String {
        let span = info_span!("tool_call", tool = %call.name);
        let start = Instant::now();

        let result = async {
            match BuiltinTool::from_name(&call.name) {
                Some(BuiltinTool::ExecuteCommand) => match call.str_arg("command") {
                    Some(command) => self.executor.execute(command).await,
                    None => missing_argument("command", BuiltinTool::ExecuteCommand),
                },
                Some(BuiltinTool::WriteFile) => {
                    match (call.str_arg("path"), call.str_arg("content")) {
                        (Some(path), Some(content)) => self.writer.write(path, content).await,
                        (None, _) => missing_argument("path", BuiltinTool::WriteFile),
                        (_, None) => missing_argument("content", BuiltinTool::WriteFile),
                    }
                }
                None => {
                    warn!(tool = %call.name, "Model called an unknown tool");
                    format!("Error: Unknown tool: {}", call.name)
                }
            }
        }
        .instrument(span)
        .await;

        let label = if BuiltinTool::from_name(&call.name).is_some() {
            call.name.as_str()
        } else {
            "unknown"
        };
        let outcome = if result.starts_with("Success:") {
            "success"
        } else {
            "error"
        };
        TOOL_CALLS.with_label_values(&[label, outcome]).inc();
        TOOL_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}

fn missing_argument(arg: &str, tool: BuiltinTool) -> String {
    warn!(tool = tool.name(), arg, "Tool call is missing a required argument");
    format!(
        "Error: Missing required argument '{}' for {}",
        arg,
        tool.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(dir: &std::path::Path) -> ToolRegistry {
        ToolRegistry::new(Arc::new(CommandPolicy::permissive(dir)))
    }

    #[test]
    fn test_declarations() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let names: Vec<&str> = registry
            .declarations()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["executeCommand", "writeFile"]);

        let write = &registry.declarations()[1];
        assert_eq!(write.parameters["type"], "OBJECT");
        assert_eq!(write.parameters["required"], json!(["path", "content"]));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            BuiltinTool::from_name("writeFile"),
            Some(BuiltinTool::WriteFile)
        );
        assert_eq!(BuiltinTool::from_name("write_file"), None);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let call = FunctionCall::new("deleteEverything", json!({}));
        let result = registry(dir.path()).dispatch(&call).await;
        assert_eq!(result, "Error: Unknown tool: deleteEverything");
    }

    #[tokio::test]
    async fn test_missing_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let result = registry
            .dispatch(&FunctionCall::new("executeCommand", json!({})))
            .await;
        assert_eq!(
            result,
            "Error: Missing required argument 'command' for executeCommand"
        );

        let result = registry
            .dispatch(&FunctionCall::new("writeFile", json!({"path": "a.txt"})))
            .await;
        assert_eq!(
            result,
            "Error: Missing required argument 'content' for writeFile"
        );
    }

    #[tokio::test]
    async fn test_dispatch_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let call = FunctionCall::new(
            "writeFile",
            json!({"path": "site/style.css", "content": "body{}"}),
        );
        let result = registry(dir.path()).dispatch(&call).await;
        assert_eq!(result, "Success: Content written to site/style.css");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("site/style.css")).unwrap(),
            "body{}"
        );
    }
}
