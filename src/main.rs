// src/main.rs
use std::path::{Path, PathBuf};
use std::process::exit;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use recon_again::{Config, ReconEngine, ReconError, SessionStatus};

#[derive(Parser)]
#[command(name = "recon-again")]
#[command(about = "Concurrent reconnaissance orchestrator")]
struct Args {
    #[command(subcommand)]
    command: Option<Cli>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Cli {
    /// Run reconnaissance against a target
    Run {
        #[arg(help = "Target domain, IP, email or username")]
        target: String,

        #[arg(long, value_delimiter = ',', help = "Tools to run (comma-separated)")]
        tools: Option<Vec<String>>,

        #[arg(long, help = "Let the advisor choose the tools")]
        ai: bool,
    },

    /// List registered tools
    Tools,

    /// Show details for one tool
    ToolInfo {
        #[arg(help = "Tool name")]
        name: String,
    },

    /// Show a session
    Session {
        #[arg(help = "Session ID")]
        id: String,
    },

    /// List recent sessions
    Sessions {
        #[arg(short, long, default_value_t = 20, help = "Maximum sessions to show")]
        limit: usize,

        #[arg(short, long, help = "Filter by status (running, completed)")]
        status: Option<String>,
    },

    /// Show stored statistics for a target
    Stats {
        #[arg(help = "Target")]
        target: String,
    },

    /// Write the effective configuration to the default location
    Init {
        #[arg(short, long, help = "Force overwrite existing configuration")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let Some(command) = args.command else {
        println!("No command specified. Use --help for available commands.");
        return Ok(());
    };

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            exit(1);
        }
    };

    match command {
        Cli::Init { force } => {
            let path = args.config.unwrap_or_else(Config::get_default_config_path);
            init_config(&config, &path, force)?;
        }
        Cli::Run { target, tools, ai } => {
            let engine = open_engine(config);
            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, waiting for running tools to finish");
                    interrupt.cancel();
                }
            });

            match engine.run_recon_with_cancel(&target, tools.as_deref(), ai, cancel).await {
                Ok(session) => println!("{}", serde_json::to_string_pretty(&session)?),
                Err(ReconError::Cancelled { session_id }) => {
                    info!("Session {} was cancelled and left running", session_id);
                    exit(130);
                }
                Err(e) => {
                    error!("Reconnaissance failed: {}", e);
                    exit(1);
                }
            }
        }
        Cli::Tools => {
            let engine = open_engine(config);
            for name in engine.list_tools() {
                if let Some(info) = engine.get_tool_info(&name) {
                    let auth = if info.requires_auth { " [auth]" } else { "" };
                    println!("{:<16} {:<6} {}{}", info.name, info.category, info.description, auth);
                }
            }
        }
        Cli::ToolInfo { name } => match open_engine(config).get_tool_info(&name) {
            Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
            None => {
                error!("Tool not found: {}", name);
                exit(1);
            }
        },
        Cli::Session { id } => match open_engine(config).get_session(&id)? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => {
                error!("Session not found: {}", id);
                exit(1);
            }
        },
        Cli::Sessions { limit, status } => {
            let status = status
                .map(|s| SessionStatus::parse(&s).with_context(|| format!("Unknown session status: {}", s)))
                .transpose()?;
            for summary in open_engine(config).list_sessions(limit, status)? {
                println!(
                    "{}  {:<10} {:>3} tools  {}",
                    summary.session_id, summary.status, summary.tool_count, summary.target
                );
            }
        }
        Cli::Stats { target } => match open_engine(config).target_stats(&target)? {
            Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
            None => println!("No records for {}", target),
        },
    }

    Ok(())
}

fn open_engine(config: Config) -> ReconEngine {
    match ReconEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to initialize engine: {}", e);
            exit(1);
        }
    }
}

fn init_config(config: &Config, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration already exists at {} (use --force to overwrite)", path.display());
        return Ok(());
    }
    config.save(path)?;
    println!("Configuration initialized at {}", path.display());
    Ok(())
}
