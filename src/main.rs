// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agent-activate entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;

use agent_activate::activation::{ActivationOutcome, ActivationStateMachine};
use agent_activate::agent::PlatformServer;
use agent_activate::config::{self, ActivationSettings, LogLevel, ProcessEnv, Resolution, LOG_LEVEL};
use agent_activate::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};
use agent_activate::workload::{demo_graph, InstrumentedWorkload, Workload};

/// Version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Safely activate the telemetry agent inside a platform-hosted process.
#[derive(Parser)]
#[command(name = "agent-activate")]
#[command(author, version, about = "Activate telemetry without racing the platform's server bootstrap", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Activate with the demo graph and serve one request
    Run {
        /// Initialization budget in milliseconds
        #[arg(long, env = "ACTIVATION_INIT_TIMEOUT_MS")]
        timeout_ms: Option<u64>,

        /// Extra time the demo graph takes to compile, in milliseconds
        #[arg(long, default_value_t = 0)]
        compile_delay_ms: u64,

        /// Request sent to the workload once ready
        #[arg(long, default_value = "What's the weather in San Francisco?")]
        prompt: String,

        /// Print the metrics report after serving
        #[arg(long)]
        metrics: bool,
    },

    /// Show resolved options and where each came from
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Resolve once; logging follows the resolved verbosity.
    let loaded = config::load_settings(&ProcessEnv);
    let level = loaded
        .as_ref()
        .map(|(_, settings)| settings.log_level)
        .unwrap_or_default();
    let _guard = init_telemetry(&TelemetryConfig::from_log_level(level))?;

    match &loaded {
        Ok((resolution, _)) => {
            if let Some(raw) = log_level_fallback(resolution) {
                tracing::warn!(value = %raw, "Unrecognized log level, using info");
            }
        }
        // Activation reports this as a config-stage failure.
        Err(e) => tracing::debug!(error = %e, "Options could not be resolved before logging"),
    }

    match cli.command {
        Commands::Run {
            timeout_ms,
            compile_delay_ms,
            prompt,
            metrics,
        } => run(loaded.ok(), timeout_ms, compile_delay_ms, &prompt, metrics).await,
        Commands::Config { json } => show_config(json),
        Commands::Version => {
            println!("agent-activate {}", VERSION);
            Ok(())
        }
    }
}

/// The raw log level value when it did not parse and `info` was used instead.
fn log_level_fallback(resolution: &Resolution) -> Option<&str> {
    resolution
        .config()
        .value(LOG_LEVEL)
        .filter(|raw| raw.parse::<LogLevel>().is_err())
}

async fn run(
    loaded: Option<(Resolution, ActivationSettings)>,
    timeout_ms: Option<u64>,
    compile_delay_ms: u64,
    prompt: &str,
    metrics: bool,
) -> anyhow::Result<()> {
    let server = Arc::new(PlatformServer::new());
    let mut machine = ActivationStateMachine::new().with_server(Arc::clone(&server));
    if let Some((resolution, settings)) = loaded {
        machine = machine.with_settings(resolution, settings);
    }
    if let Some(ms) = timeout_ms {
        machine = machine.with_timeout(Duration::from_millis(ms));
    }

    let delay = Duration::from_millis(compile_delay_ms);
    let outcome = machine
        .activate(move |ctx| {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            demo_graph(ctx.agent).compile()
        })
        .await;

    let (handle, monitoring_active, agent) = match outcome {
        ActivationOutcome::Ready {
            handle,
            monitoring_active,
            agent,
        } => (handle, monitoring_active, agent),
        ActivationOutcome::Failed(reason) => {
            eprintln!("{} {}", "✗".red(), reason.to_string().red());
            std::process::exit(1);
        }
    };

    // The platform now builds its own server; the agent's lazy hook load fires here.
    server.begin_bootstrap();
    if let Some(agent) = &agent {
        match agent.on_server_bootstrap() {
            Ok(value) => tracing::debug!(?value, "Server bootstrap hook resolved"),
            Err(e) => tracing::warn!(error = %e, "Server bootstrap hook failed"),
        }
    }

    let status = if monitoring_active {
        "active".green()
    } else {
        "inactive".yellow()
    };
    println!("Monitoring: {}", status);

    let input = json!({ "messages": [{ "role": "user", "content": prompt }] });
    let output = match agent {
        Some(agent) => InstrumentedWorkload::new(handle, agent).ainvoke(input).await?,
        None => handle.ainvoke(input).await?,
    };

    if let Some(reply) = output["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|message| message["content"].as_str())
    {
        println!("{} {}", "→".cyan(), reply);
    }

    if metrics {
        println!("\n{}", GLOBAL_METRICS.snapshot().format_report());
    }
    Ok(())
}

fn show_config(json: bool) -> anyhow::Result<()> {
    let resolution = config::load_config(&ProcessEnv)?;

    if json {
        let entries: Vec<_> = resolution
            .config()
            .entries()
            .map(|entry| {
                json!({
                    "key": entry.key,
                    "value": entry.display_value(),
                    "source": entry.source,
                })
            })
            .collect();
        let out = json!({
            "complete": resolution.is_complete(),
            "entries": entries,
            "missing": resolution.missing(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "⚙ Activation Options".bright_blue().bold());
    for entry in resolution.config().entries() {
        println!(
            "{:<26} {} {}",
            entry.key.bright_white(),
            entry.display_value(),
            format!("({})", entry.source).dimmed()
        );
    }
    for key in resolution.missing() {
        println!("{:<26} {}", key.bright_white(), "missing".red());
    }
    if !resolution.is_complete() {
        println!(
            "\n{}",
            "Monitoring will be inactive until the missing options are set".yellow()
        );
    }
    Ok(())
}
