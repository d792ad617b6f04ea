//! Rules Probe Agent entry point
//!
//! Writes, reads back and deletes one synthetic `groups` record to check the
//! database's access rules.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rules_probe::contracts::*;
use rules_probe::engine::{summarize, RulesProbe, TriggerOutcome};
use rules_probe::handler::{create_router, AppState};
use rules_probe::telemetry::{init_tracing, ProbeMetrics};
use rules_probe::{FirebaseRestStore, MemoryStore, ProbeConfig, RemoteStore, StaticIdentity};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rules-probe")]
#[command(about = "Rules Probe Agent - access rule compliance probe for the groups collection")]
#[command(version)]
struct Cli {
    /// Config file (YAML or TOML)
    #[arg(short, long, global = true, env = "RULES_PROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the probe directly
    Run {
        /// Number of independent runs to start concurrently
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Use an in-process store instead of the remote database
        #[arg(long)]
        memory: bool,
    },

    /// Deliver an activation signal
    Trigger {
        /// Signal identifier
        #[arg(short, long)]
        action: String,

        #[arg(long)]
        memory: bool,
    },

    /// Start the HTTP signal handler
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8083", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long)]
        memory: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = ProbeConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let metrics = Arc::new(ProbeMetrics::new()?);

    match cli.command {
        Commands::Run { count, memory } => {
            let probe = build_probe(&config, memory, Arc::clone(&metrics))?;

            let run_ids: Vec<Uuid> = (0..count.max(1)).map(|_| Uuid::new_v4()).collect();
            let runs = run_ids.iter().map(|run_id| probe.run_with_id(*run_id));
            let results = futures::future::join_all(runs).await;

            let mut failed = false;
            for (run_id, result) in run_ids.into_iter().zip(&results) {
                failed |= result.is_err();
                print_summary(&summarize(run_id, result))?;
            }

            if failed {
                std::process::exit(1);
            }
        }

        Commands::Trigger { action, memory } => {
            let probe = build_probe(&config, memory, Arc::clone(&metrics))?;

            match probe.trigger(&action).await {
                TriggerOutcome::Ignored => {
                    println!("{} signal {} does not match {}", "IGNORED".yellow(), action, config.action);
                }
                TriggerOutcome::Completed { run_id, result } => {
                    print_summary(&summarize(run_id, &result))?;
                    if result.is_err() {
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Serve { port, host, memory } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let probe = Arc::new(build_probe(&config, memory, Arc::clone(&metrics))?);
            let router = create_router(Arc::new(AppState::new(probe, metrics)));

            tracing::info!("Starting Rules Probe Agent on {}", addr);
            tracing::info!("Agent ID: {}, Version: {}", AGENT_ID, AGENT_VERSION);
            tracing::info!("Listening for action {}", config.action);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}

fn build_probe(
    config: &ProbeConfig,
    memory: bool,
    metrics: Arc<ProbeMetrics>,
) -> anyhow::Result<RulesProbe> {
    let identity = Arc::new(StaticIdentity::from_config(&config.auth));

    let store: Arc<dyn RemoteStore> = if memory {
        let store = match &config.auth.uid {
            Some(uid) => MemoryStore::new().with_owner_rule(uid.clone()),
            None => MemoryStore::new(),
        };
        Arc::new(store)
    } else {
        let url = config
            .database_url
            .as_deref()
            .context("database_url is required unless --memory is given")?;
        Arc::new(FirebaseRestStore::new(url))
    };

    Ok(RulesProbe::new(store, identity)
        .with_settings(config.into())
        .with_metrics(metrics))
}

fn print_summary(summary: &RunSummary) -> anyhow::Result<()> {
    let label = if summary.passed {
        "PASSED".green()
    } else {
        "FAILED".red()
    };
    eprintln!("{} {}", label, summary.stage);
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
