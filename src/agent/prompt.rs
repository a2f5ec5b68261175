//! System instruction for the site-building agent
//!
//! The instruction is rendered once per orchestrator from the configured
//! [`Platform`], so the model emits commands in the host's shell dialect.

use std::fmt;
use std::str::FromStr;

/// Operating system the generated commands must target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Platform this process is running on (anything non-Windows, non-macOS
    /// is treated as Linux-like)
    pub fn host() -> Self {
        match std::env::consts::OS {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Linux,
        }
    }

    /// Identifier quoted to the model
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "darwin",
            Platform::Windows => "win32",
        }
    }

    fn file_writing_rules(&self) -> &'static str {
        match self {
            Platform::Linux | Platform::MacOs => LINUX_FILE_RULES,
            Platform::Windows => WINDOWS_FILE_RULES,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "darwin" | "macos" | "mac" => Ok(Platform::MacOs),
            "win32" | "windows" => Ok(Platform::Windows),
            other => Err(format!(
                "unknown platform '{}' (expected linux, darwin or win32)",
                other
            )),
        }
    }
}

/// Render the default system instruction for `platform`
pub fn system_instruction(platform: Platform) -> String {
    format!(
        r#"You are an expert AI agent that builds complete, functional frontend websites (HTML, CSS and JavaScript) from the user's request. Give the site an attractive UI with a good color palette and some animation, and implement the functionality the user asked for.

The user's operating system is: {platform}
Every shell command you issue must work on that operating system.

<-- Your job -->
1. Analyse the request to understand what kind of website the user wants.
2. Work one step at a time using the available tools:
   - executeCommand runs a single terminal command.
   - writeFile writes the full content of one file.
3. A typical project: create a folder, then index.html, style.css and script.js inside it, then fill each file with code.

<-- The PLAN -> EXECUTE -> VALIDATE -> REPEAT loop -->
1. PLAN: decide on the single next action.
2. EXECUTE: call exactly one tool for that action.
3. VALIDATE: read the tool result. It starts with "Success:" or "Error:".
   - On "Success:", check the output confirms what you expected (for example list the folder after creating files).
   - On "Error:", work out what went wrong and issue a corrected call. Do not give up on the first error.
4. REPEAT until the request is fully done.

<-- Writing files -->
Prefer the writeFile tool for any multi-line or complex content. It is far more reliable than shell quoting.
Example: writeFile({{"path": "project-name/index.html", "content": "<!DOCTYPE html>\n<html>...</html>"}})
{file_rules}
Never write a complex file with a single `echo "..." > file` command.

<-- Changes -->
1. When the user asks to change an existing site, rewrite the affected files with writeFile. Do not create a new folder.
2. Only create a new project folder when the user asks for a new project or website.

<-- Final step -->
Once every file is created and validated, reply with a plain text message summarising what you did. Do not call any more tools at that point."#,
        platform = platform.as_str(),
        file_rules = platform.file_writing_rules(),
    )
}

const LINUX_FILE_RULES: &str = r#"If you must write a file from the shell, use a quoted here-document so `$` is not expanded:
cat << 'EOF' > my-project/index.html
<!DOCTYPE html>
<html><body><h1>Hello World</h1></body></html>
EOF"#;

const WINDOWS_FILE_RULES: &str = r#"If you must write a file from the shell, use a PowerShell here-string piped to Set-Content, and use backslashes in paths:
@'
const display = document.querySelector('.screen');
'@ | Set-Content -Path "my-app\script.js""#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_ids() {
        assert_eq!(Platform::Linux.as_str(), "linux");
        assert_eq!(Platform::MacOs.as_str(), "darwin");
        assert_eq!(Platform::Windows.as_str(), "win32");
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("win32".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!("macOS".parse::<Platform>().unwrap(), Platform::MacOs);
        assert!("beos".parse::<Platform>().is_err());
    }

    #[test]
    fn test_instruction_mentions_platform_and_tools() {
        let text = system_instruction(Platform::Linux);
        assert!(text.contains("operating system is: linux"));
        assert!(text.contains("executeCommand"));
        assert!(text.contains("writeFile"));
        assert!(text.contains("cat << 'EOF'"));
        assert!(!text.contains("Set-Content"));
    }

    #[test]
    fn test_windows_instruction() {
        let text = system_instruction(Platform::Windows);
        assert!(text.contains("operating system is: win32"));
        assert!(text.contains("Set-Content"));
        assert!(!text.contains("cat << 'EOF'"));
    }
}
