//! Capability boundary for model-issued tool calls
//!
//! Every command and file write the model asks for runs with the privileges
//! of this process. The policy narrows that down:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  CommandPolicy                                               │
//! │                                                              │
//! │  workspace_root     cwd for every command, base for writes   │
//! │  allowed_binaries   leading program of each segment must     │
//! │                     be listed (empty list = anything goes)   │
//! │  confine_writes     writeFile paths must stay under root     │
//! │  command_timeout    kill the child after this long           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The permissive default reproduces the unrestricted relay. Tighten it from
//! configuration.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// CommandPolicy
// ═══════════════════════════════════════════════════════════════════════════
// WHAT IT IS:
//   The restrictions applied to the Command Executor and File Writer.
//
// HOW TO USE:
//   1. Build from Settings::command_policy() or CommandPolicy::permissive()
//   2. Share it as Arc<CommandPolicy> between CommandExecutor and FileWriter
//   3. check_command() before spawning, resolve_path() before writing
//
// EXAMPLE:
//   let policy = CommandPolicy {
//       allowed_binaries: vec!["mkdir".into(), "ls".into()],
//       ..CommandPolicy::permissive("./sites")
//   };
//   policy.check_command("mkdir calc && ls")?;          // Ok
//   policy.check_command("mkdir $(curl evil.example)")?; // BinaryNotAllowed
// ═══════════════════════════════════════════════════════════════════════════
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    /// Working directory for commands and base for relative write paths
    pub workspace_root: PathBuf,
    /// Program names a command may start with; empty means unrestricted
    pub allowed_binaries: Vec<String>,
    /// Reject writes that resolve outside `workspace_root`
    pub confine_writes: bool,
    /// Kill commands that run longer than this
    pub command_timeout: Option<Duration>,
}

impl CommandPolicy {
    /// No allow-list, no confinement, no timeout
    pub fn permissive(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            allowed_binaries: Vec::new(),
            confine_writes: false,
            command_timeout: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // check_command(command) - Match a shell command against the allow-list
    // ═══════════════════════════════════════════════════════════════════════
    // WHAT IT DOES:
    //   1. Reject empty commands; with no allow-list, accept the rest
    //   2. Reject backticks outside single quotes
    //   3. Check the body of every $(…), <(…) and >(…) recursively
    //   4. Split what is left on ;, &&, ||, |, & and newlines
    //   5. The first word of each segment (after VAR=value assignments)
    //      must be an allowed program name
    // ═══════════════════════════════════════════════════════════════════════
    pub fn check_command(&self, command: &str) -> Result<(), PolicyViolation> {
        if command.trim().is_empty() {
            return Err(PolicyViolation::EmptyCommand);
        }
        if self.allowed_binaries.is_empty() {
            return Ok(());
        }

        let (outer, bodies) = extract_substitutions(command)?;
        for body in bodies {
            if !body.trim().is_empty() {
                self.check_command(body)?;
            }
        }

        for segment in split_segments(&outer) {
            let words = shlex::split(segment)
                .ok_or_else(|| PolicyViolation::Unparseable(segment.trim().to_string()))?;

            let program = words.iter().find(|w| !is_env_assignment(w));
            let Some(program) = program else {
                continue;
            };

            let name = Path::new(program)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(program);

            if !self.allowed_binaries.iter().any(|allowed| allowed == name) {
                return Err(PolicyViolation::BinaryNotAllowed(name.to_string()));
            }
        }

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // resolve_path(path) - Turn a writeFile path into a filesystem target
    // ═══════════════════════════════════════════════════════════════════════
    // WHAT IT DOES:
    //   Joins `path` onto the workspace root. When confine_writes is set,
    //   `.` and `..` are resolved lexically and the result must still sit
    //   under the root.
    // ═══════════════════════════════════════════════════════════════════════
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf, PolicyViolation> {
        if path.trim().is_empty() {
            return Err(PolicyViolation::EmptyPath);
        }

        let joined = self.workspace_root.join(path);
        if !self.confine_writes {
            return Ok(joined);
        }

        let normalized = normalize_path(&joined);
        if !normalized.starts_with(normalize_path(&self.workspace_root)) {
            return Err(PolicyViolation::OutsideWorkspace(path.to_string()));
        }
        Ok(normalized)
    }
}

/// Why a tool call was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    EmptyCommand,
    EmptyPath,
    Unparseable(String),
    /// `` `…` `` substitution, which is not inspected
    Backticks,
    BinaryNotAllowed(String),
    OutsideWorkspace(String),
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyViolation::EmptyCommand => write!(f, "Command is empty"),
            PolicyViolation::EmptyPath => write!(f, "Path is empty"),
            PolicyViolation::Unparseable(segment) => {
                write!(f, "Could not parse command segment: {}", segment)
            }
            PolicyViolation::Backticks => {
                write!(f, "Backtick command substitution is not allowed; use $(...)")
            }
            PolicyViolation::BinaryNotAllowed(name) => {
                write!(f, "Command '{}' is not in the allowed list", name)
            }
            PolicyViolation::OutsideWorkspace(path) => {
                write!(f, "Path {} is outside the workspace", path)
            }
        }
    }
}

impl std::error::Error for PolicyViolation {}

/// Pull out the bodies of `$(…)`, `<(…)` and `>(…)` that the shell would
/// run, replacing each with a placeholder word in the returned outer text.
///
/// Single-quoted text is literal and skipped. Parentheses inside a body are
/// matched by depth only, so an unbalanced body is reported as unparseable.
fn extract_substitutions(command: &str) -> Result<(String, Vec<&str>), PolicyViolation> {
    let bytes = command.as_bytes();
    let mut outer = String::with_capacity(command.len());
    let mut bodies = Vec::new();
    let mut copied = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_single {
            if b == b'\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }

        match b {
            b'\\' => {
                i += 2;
                continue;
            }
            b'\'' if !in_double => in_single = true,
            b'"' => in_double = !in_double,
            b'`' => return Err(PolicyViolation::Backticks),
            b'$' | b'<' | b'>' if bytes.get(i + 1) == Some(&b'(') => {
                let start = i + 2;
                let end = find_matching_paren(bytes, start)
                    .ok_or_else(|| PolicyViolation::Unparseable(command[i..].trim().to_string()))?;

                outer.push_str(&command[copied..i]);
                outer.push('_');
                bodies.push(&command[start..end]);
                copied = end + 1;
                i = end + 1;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    outer.push_str(&command[copied.min(command.len())..]);

    Ok((outer, bodies))
}

/// Index of the `)` closing the `(` just before `start`
fn find_matching_paren(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1;
    for (offset, b) in bytes.get(start..)?.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_segments(command: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let bytes = command.as_bytes();
    let mut start = 0;
    let mut i = 0;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b';' | b'\n' | b'|' | b'&' => {
                    segments.push(&command[start..i]);
                    // swallow the second char of && and ||
                    if (b == b'&' || b == b'|') && bytes.get(i + 1) == Some(&b) {
                        i += 1;
                    }
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    segments.push(&command[start..]);

    segments.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
