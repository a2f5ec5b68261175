//! Command-line and environment configuration
//!
//! Every setting can come from a flag or an environment variable, so the
//! relay can be started with nothing but `GEMINI_API_KEY` exported.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::agent::{AgentConfig, Platform};
use crate::model::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::model::ollama::DEFAULT_OLLAMA_BASE_URL;
use crate::model::{GeminiClient, ModelClient, ModelError, OllamaClient};
use crate::security::{CommandPolicy, RateLimiter};

/// CLI arguments for siteforge
#[derive(Parser, Debug)]
#[command(name = "siteforge")]
#[command(about = "Chat relay that lets a hosted model scaffold static websites through tool calls")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve POST /ai/chat (default)
    Serve,
    /// Run a single request from the terminal and print the answer
    Run {
        /// What to build, e.g. "a calculator with a dark theme"
        prompt: String,
    },
}

/// Which provider answers model calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    Ollama,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Model provider
    #[arg(long, value_enum, env = "SITEFORGE_PROVIDER", default_value = "gemini")]
    pub provider: Provider,

    /// Model name (defaults to gemini-2.5-flash for Gemini, qwen3 for Ollama)
    #[arg(long, env = "SITEFORGE_MODEL", value_name = "MODEL")]
    pub model: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", value_name = "KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Provider base URL override
    #[arg(long, env = "SITEFORGE_MODEL_URL", value_name = "URL")]
    pub model_url: Option<String>,

    /// HTTP timeout for a single model call, in seconds
    #[arg(long, env = "SITEFORGE_MODEL_TIMEOUT", default_value_t = 120)]
    pub model_timeout_secs: u64,

    /// Address the HTTP server binds to
    #[arg(long, env = "SITEFORGE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Origin allowed to call the API from a browser ("*" for any)
    #[arg(long, env = "SITEFORGE_CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,

    /// Directory commands run in and files are written under
    #[arg(long, env = "SITEFORGE_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Operating system the model writes commands for (defaults to the host)
    #[arg(long, env = "SITEFORGE_PLATFORM")]
    pub platform: Option<Platform>,

    /// Maximum model calls per request
    #[arg(long, env = "SITEFORGE_MAX_ITERATIONS", default_value_t = 25)]
    pub max_iterations: usize,

    /// Wall-clock budget per request, in seconds
    #[arg(long, env = "SITEFORGE_DEADLINE")]
    pub deadline_secs: Option<u64>,

    /// Kill a command after this many seconds (0 disables)
    #[arg(long, env = "SITEFORGE_COMMAND_TIMEOUT", default_value_t = 120)]
    pub command_timeout_secs: u64,

    /// Programs a command may start with, comma separated (empty allows all)
    #[arg(long, env = "SITEFORGE_ALLOW", value_delimiter = ',')]
    pub allow: Vec<String>,

    /// Refuse writeFile paths that leave the workspace
    #[arg(long, env = "SITEFORGE_CONFINE_WRITES")]
    pub confine_writes: bool,

    /// Chat requests admitted in a burst (0 disables rate limiting)
    #[arg(long, env = "SITEFORGE_RATE_BURST", default_value_t = 20)]
    pub rate_burst: u32,

    /// Chat requests admitted per second after the burst
    #[arg(long, env = "SITEFORGE_RATE_PER_SEC", default_value_t = 2.0)]
    pub rate_per_sec: f64,

    /// OTLP collector endpoint; traces are only exported when set
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", value_name = "URL")]
    pub otlp_endpoint: Option<String>,

    /// Log line format
    #[arg(long, value_enum, env = "SITEFORGE_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

/// Error type for turning settings into runtime components
#[derive(Debug)]
pub enum ConfigError {
    /// Gemini selected without a key
    MissingApiKey,
    /// Workspace directory could not be created
    Workspace(PathBuf, std::io::Error),
    /// HTTP client for the provider could not be built
    Client(ModelError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingApiKey => {
                write!(f, "Gemini needs an API key: set GEMINI_API_KEY or pass --api-key")
            }
            ConfigError::Workspace(path, e) => {
                write!(f, "Cannot use workspace {}: {}", path.display(), e)
            }
            ConfigError::Client(e) => write!(f, "Cannot build model client: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Settings {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations,
            deadline: self.deadline_secs.map(Duration::from_secs),
            platform: self.platform.unwrap_or_else(Platform::host),
            system_prompt: None,
        }
    }

    /// Build the command policy, creating the workspace if needed
    pub fn command_policy(&self) -> Result<CommandPolicy, ConfigError> {
        std::fs::create_dir_all(&self.workspace)
            .map_err(|e| ConfigError::Workspace(self.workspace.clone(), e))?;
        let workspace_root = std::fs::canonicalize(&self.workspace)
            .map_err(|e| ConfigError::Workspace(self.workspace.clone(), e))?;

        Ok(CommandPolicy {
            workspace_root,
            allowed_binaries: self
                .allow
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            confine_writes: self.confine_writes,
            command_timeout: (self.command_timeout_secs > 0)
                .then(|| Duration::from_secs(self.command_timeout_secs)),
        })
    }

    /// `None` when rate limiting is disabled
    pub fn rate_limiter(&self) -> Option<RateLimiter> {
        (self.rate_burst > 0).then(|| RateLimiter::new(self.rate_burst, self.rate_per_sec))
    }

    pub fn model_name(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) => model.clone(),
            (None, Provider::Gemini) => DEFAULT_GEMINI_MODEL.to_string(),
            (None, Provider::Ollama) => "qwen3".to_string(),
        }
    }

    pub fn model_client(&self) -> Result<Arc<dyn ModelClient>, ConfigError> {
        let timeout = Duration::from_secs(self.model_timeout_secs);
        let model = self.model_name();

        let client: Arc<dyn ModelClient> = match self.provider {
            Provider::Gemini => {
                let api_key = self
                    .api_key
                    .as_deref()
                    .filter(|k| !k.is_empty())
                    .ok_or(ConfigError::MissingApiKey)?;
                let base = self.model_url.as_deref().unwrap_or(DEFAULT_GEMINI_BASE_URL);
                Arc::new(
                    GeminiClient::new(base, api_key, model, timeout).map_err(ConfigError::Client)?,
                )
            }
            Provider::Ollama => {
                let base = self.model_url.as_deref().unwrap_or(DEFAULT_OLLAMA_BASE_URL);
                Arc::new(OllamaClient::new(base, model, timeout).map_err(ConfigError::Client)?)
            }
        };

        Ok(client)
    }
}
