//! Command Executor - runs one model-issued shell command on the host
//!
//! The textual result is what the model sees:
//!
//! ```text
//! stderr empty, exit 0   → "Success: {stdout} || Task executed completely"
//! stderr non-empty       → "Error: {stderr}"
//! stderr empty, exit ≠ 0 → "Error: Command failed with exit code N: {stdout}"
//! spawn/policy/timeout   → "Error: {description}"
//! ```

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::security::{CommandPolicy, PolicyViolation};

/// Record of a single command run
#[derive(Debug, Clone)]
pub struct CommandRecord {
    /// Command as the model sent it
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub duration_ms: f64,
}

impl CommandRecord {
    /// Format the record the way the model expects
    pub fn to_tool_result(&self) -> String {
        if !self.stderr.is_empty() {
            return format!("Error: {}", self.stderr);
        }
        match self.exit_code {
            Some(0) => format!("Success: {} || Task executed completely", self.stdout),
            Some(code) => format!(
                "Error: Command failed with exit code {}: {}",
                code, self.stdout
            ),
            None => format!("Error: Command terminated by signal: {}", self.stdout),
        }
    }
}

/// Error type for command execution
#[derive(Debug)]
pub enum CommandError {
    /// Refused by the command policy
    Policy(PolicyViolation),
    /// Process could not be spawned or awaited
    Spawn(std::io::Error),
    /// Process ran past the policy timeout and was killed
    TimedOut { secs: f64 },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Policy(v) => write!(f, "Command rejected: {}", v),
            CommandError::Spawn(e) => write!(f, "Failed to run command: {}", e),
            CommandError::TimedOut { secs } => write!(f, "Command timed out after {:.1}s", secs),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<PolicyViolation> for CommandError {
    fn from(v: PolicyViolation) -> Self {
        CommandError::Policy(v)
    }
}

impl From<std::io::Error> for CommandError {
    fn from(e: std::io::Error) -> Self {
        CommandError::Spawn(e)
    }
}

/// Runs shell commands inside the policy's workspace
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    policy: Arc<CommandPolicy>,
}

impl CommandExecutor {
    pub fn new(policy: Arc<CommandPolicy>) -> Self {
        Self { policy }
    }

    /// Run a command and return the model-facing result text
    pub async fn execute(&self, command: &str) -> String {
        match self.run(command).await {
            Ok(record) => record.to_tool_result(),
            Err(e) => {
                warn!(command = %command, error = %e, "Command did not run");
                format!("Error: {}", e)
            }
        }
    }

    /// Run a command through the platform shell and capture its output
    pub async fn run(&self, command: &str) -> Result<CommandRecord, CommandError> {
        self.policy.check_command(command)?;

        let mut cmd = shell_command(command);
        cmd.current_dir(&self.policy.workspace_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(command = %command, cwd = %self.policy.workspace_root.display(), "Executing command");
        let start = Instant::now();

        let output = match self.policy.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(CommandError::TimedOut {
                        secs: limit.as_secs_f64(),
                    })
                }
            },
            None => cmd.output().await?,
        };

        let record = CommandRecord {
            command: command.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        debug!(
            exit_code = ?record.exit_code,
            stdout_len = record.stdout.len(),
            stderr_len = record.stderr.len(),
            duration_ms = record.duration_ms,
            "Command finished"
        );

        Ok(record)
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn executor(dir: &std::path::Path) -> CommandExecutor {
        CommandExecutor::new(Arc::new(CommandPolicy::permissive(dir)))
    }

    #[tokio::test]
    async fn test_stdout_only_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path()).execute("echo hello").await;
        assert!(result.starts_with("Success:"), "{result}");
        assert!(result.contains("hello"));
        assert!(result.ends_with("|| Task executed completely"));
    }

    #[tokio::test]
    async fn test_stderr_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path()).execute("echo broken 1>&2").await;
        assert_eq!(result, "Error: broken\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_stderr_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path()).execute("echo partial; exit 3").await;
        assert_eq!(result, "Error: Command failed with exit code 3: partial\n");
    }

    #[tokio::test]
    async fn test_runs_in_workspace_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path()).execute("mkdir calc && ls").await;
        assert!(result.starts_with("Success:"));
        assert!(dir.path().join("calc").is_dir());
    }

    #[tokio::test]
    async fn test_missing_binary_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute("definitely-not-a-real-binary-xyz")
            .await;
        assert!(result.starts_with("Error:"), "{result}");
    }

    #[tokio::test]
    async fn test_policy_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let policy = CommandPolicy {
            allowed_binaries: vec!["echo".into()],
            ..CommandPolicy::permissive(dir.path())
        };
        let exec = CommandExecutor::new(Arc::new(policy));

        let result = exec.execute("rm -rf .").await;
        assert_eq!(
            result,
            "Error: Command rejected: Command 'rm' is not in the allowed list"
        );
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let policy = CommandPolicy {
            command_timeout: Some(Duration::from_millis(100)),
            ..CommandPolicy::permissive(dir.path())
        };
        let exec = CommandExecutor::new(Arc::new(policy));

        let err = exec.run("sleep 5").await.unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }
}
