//! File Writer - writes model-supplied content to disk
//!
//! Missing parent directories are created. Existing files are replaced in
//! full; there is no append or merge.

use std::sync::Arc;

use tracing::{info, warn};

use crate::security::{CommandPolicy, PolicyViolation};

/// Error type for file writes
#[derive(Debug)]
pub enum WriteError {
    /// Path refused by the command policy
    Policy(PolicyViolation),
    /// Directory creation or the write itself failed
    Io(std::io::Error),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Policy(v) => write!(f, "Write rejected: {}", v),
            WriteError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Policy(v) => Some(v),
            WriteError::Io(e) => Some(e),
        }
    }
}

impl From<PolicyViolation> for WriteError {
    fn from(v: PolicyViolation) -> Self {
        WriteError::Policy(v)
    }
}

impl From<std::io::Error> for WriteError {
    fn from(e: std::io::Error) -> Self {
        WriteError::Io(e)
    }
}

/// Writes files relative to the policy's workspace root
#[derive(Debug, Clone)]
pub struct FileWriter {
    policy: Arc<CommandPolicy>,
}

impl FileWriter {
    pub fn new(policy: Arc<CommandPolicy>) -> Self {
        Self { policy }
    }

    /// Write `content` to `path` and return the model-facing result text
    ///
    /// The success message echoes `path` exactly as the model sent it.
    pub async fn write(&self, path: &str, content: &str) -> String {
        match self.write_inner(path, content).await {
            Ok(()) => {
                info!(path = %path, bytes = content.len(), "File written");
                format!("Success: Content written to {}", path)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "File write failed");
                format!("Error: {}", e)
            }
        }
    }

    async fn write_inner(&self, path: &str, content: &str) -> Result<(), WriteError> {
        let target = self.policy.resolve_path(path)?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&target, content).await?;
        Ok(())
    }
}
