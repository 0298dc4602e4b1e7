//! Foreman - run supervisor scenarios from the command line
//!
//! - `foreman run <scenario.toml>` replays a scripted conversation
//! - `foreman check <scenario.toml>` only validates the setup

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use foreman_core::{Memory, SupervisorEvent};

mod scenario;

use scenario::Scenario;

/// Foreman - multi-agent supervisor runner
#[derive(Parser)]
#[command(name = "foreman")]
#[command(about = "Run and validate Foreman supervisor scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario to completion
    Run {
        scenario: PathBuf,

        /// User input (overrides the scenario's `input`)
        #[arg(short, long)]
        input: Option<String>,

        /// Print events and the final memory as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Validate a scenario without running it
    Check { scenario: PathBuf },
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run(path: PathBuf, input: Option<String>, json: bool) -> Result<()> {
    let scenario = Scenario::load(&path)?;
    let supervisor = Arc::new(scenario.build()?);
    let input = input.or(scenario.input);

    tracing::info!(scenario = %path.display(), "Running scenario");

    let (mut events, handle) = supervisor.stream(Memory::new(), input);
    let mut stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        if json {
            writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
            continue;
        }
        match event {
            SupervisorEvent::Delta { delta } => {
                write!(stdout, "{}", delta)?;
                stdout.flush()?;
            }
            SupervisorEvent::HandoffStarted { agent, task } => {
                writeln!(
                    stdout,
                    "\n[handoff -> {}: {}]",
                    agent,
                    task.as_deref().unwrap_or("None")
                )?;
            }
            SupervisorEvent::HandoffCompleted { agent, messages_added } => {
                writeln!(stdout, "[{} returned, +{} messages]", agent, messages_added)?;
            }
            SupervisorEvent::ToolCall { name, .. } => {
                writeln!(stdout, "\n[tool {}]", name)?;
            }
            SupervisorEvent::Finished { .. } => writeln!(stdout)?,
        }
    }

    let (memory, result) = handle.await.context("supervisor task failed")?;
    let response = result?;

    if json {
        writeln!(stdout, "{}", serde_json::to_string(&memory)?)?;
    } else {
        writeln!(stdout, "\n--- memory ({} messages) ---", memory.len())?;
        for message in memory.all() {
            writeln!(stdout, "{:>9}: {}", message.role, message.content)?;
        }
    }

    tracing::info!(iterations = response.iterations, "Scenario finished");
    Ok(())
}

fn check(path: PathBuf) -> Result<()> {
    let scenario = Scenario::load(&path)?;
    let supervisor = scenario.build()?;
    let registry = supervisor.registry();
    println!(
        "{}: ok ({} tools, {} agents, output mode {})",
        path.display(),
        registry.tool_names().len(),
        registry.agent_names().len(),
        supervisor.output_mode()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    match cli.command {
        Commands::Run {
            scenario,
            input,
            json,
        } => run(scenario, input, json).await,
        Commands::Check { scenario } => check(scenario),
    }
}
