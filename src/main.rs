use std::sync::Arc;

use clap::Parser;

use siteforge::agent::{Orchestrator, RunStatus};
use siteforge::config::{Cli, Command, Settings};
use siteforge::model::Message;
use siteforge::tools::ToolRegistry;
use siteforge::{server, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = cli.settings;

    telemetry::init_tracing(
        "siteforge",
        settings.otlp_endpoint.as_deref(),
        settings.log_format,
    )?;

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(&settings).await,
        Command::Run { prompt } => run_once(&settings, prompt).await,
    };

    telemetry::shutdown_tracing();
    result
}

/// Drive one request from the terminal
async fn run_once(
    settings: &Settings,
    prompt: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let policy = Arc::new(settings.command_policy()?);
    let tools = Arc::new(ToolRegistry::new(policy.clone()));
    let orchestrator = Orchestrator::new(settings.model_client()?, tools, settings.agent_config());

    println!("[SITEFORGE] Workspace: {}", policy.workspace_root.display());
    println!("[SITEFORGE] Model: {}", settings.model_name());

    let result = orchestrator.run(vec![Message::user(prompt)]).await?;

    println!("[SITEFORGE] Trace ID: {}", result.trace_id);
    for record in &result.tool_calls {
        let first_line = record.result.lines().next().unwrap_or("");
        println!(
            "[TOOL] {} ({:.0}ms) → {}",
            record.call.name, record.duration_ms, first_line
        );
    }
    println!("─────────────────────────────────────────");

    match result.status {
        RunStatus::Completed => println!("{}", result.final_response),
        RunStatus::Incomplete(reason) => println!("[SITEFORGE] Incomplete: {}", reason),
    }

    Ok(())
}
