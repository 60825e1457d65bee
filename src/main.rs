//! tagscan CLI entry point.
//!
//! ```bash
//! tagscan example > tagscan.toml
//! tagscan scan tagscan.toml --json
//! tagscan run tagscan.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tagscan::catalog::{backfill, Catalog, LegacyExport};
use tagscan::config::{factory, ScanConfig, EXAMPLE_CONFIG};
use tagscan::core::metadata::get_transport_registry;
use tagscan::scan::{CycleScheduler, SchedulerEvent};
use tagscan::{Result, ScanError};

/// Scan cycle engine for tag-based industrial controllers
#[derive(Parser, Debug)]
#[command(name = "tagscan", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler until Ctrl+C
    Run {
        /// Configuration file path
        config: PathBuf,

        /// Output scheduler events as JSON Lines
        #[arg(long)]
        jsonl: bool,
    },

    /// Run a single scan cycle and print its report
    Scan {
        /// Configuration file path
        config: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an example configuration
    Example,

    /// List available transports
    ListTransports,

    /// Assign signals to a legacy export and print the summary
    Backfill {
        /// Legacy export (JSON with `devices` and `readings`)
        input: PathBuf,

        /// Write the updated export here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { config, jsonl } => run(&config, jsonl).await,
        Commands::Scan { config, json } => scan(&config, json).await,
        Commands::Example => {
            print!("{}", EXAMPLE_CONFIG);
            Ok(())
        }
        Commands::ListTransports => {
            list_transports();
            Ok(())
        }
        Commands::Backfill { input, output } => run_backfill(&input, output.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,tagscan=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(path: &Path, jsonl: bool) -> Result<()> {
    let config = ScanConfig::from_file(path)?;
    let engine = Arc::new(factory::create_engine(&config)?);
    info!(
        signals = config.signal_count(),
        transport = engine.transport_name(),
        store = engine.store_name(),
        "Configuration loaded"
    );

    let mut scheduler = CycleScheduler::new(engine, config.scanner.scheduler_config());
    let mut events = scheduler.subscribe();
    scheduler.start()?;
    eprintln!("Scheduler started. Press Ctrl+C to stop.");

    let event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if jsonl {
                        if let Ok(json) = serde_json::to_string(&event) {
                            println!("{}", json);
                        }
                    } else {
                        print_event(&event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("Warning: event receiver lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down...");

    scheduler.stop().await;
    let stats = scheduler.stats();
    event_task.abort();
    let _ = event_task.await;

    eprintln!(
        "Stopped after {} cycles ({} failed, {} ticks skipped).",
        stats.cycles_started, stats.cycles_failed, stats.ticks_skipped
    );
    Ok(())
}

fn print_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::CycleStarted { at } => println!("[CYCLE] started at {}", at),
        SchedulerEvent::CycleCompleted { report } => {
            println!("[CYCLE] {:?} {}", report.outcome, report.summary());
            for anomaly in &report.anomalies {
                println!("  ! {}", anomaly);
            }
        }
        SchedulerEvent::CycleFailed { error } => println!("[FAILED] {}", error),
        SchedulerEvent::TickSkipped { at } => {
            println!("[SKIPPED] tick at {} (previous cycle still running)", at)
        }
        SchedulerEvent::Stopped => println!("[STOPPED]"),
    }
}

async fn scan(path: &Path, json: bool) -> Result<()> {
    let config = ScanConfig::from_file(path)?;
    let engine = factory::create_engine(&config)?;

    let report = engine.run_cycle().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{:?}: {}", report.outcome, report.summary());
        for anomaly in &report.anomalies {
            println!("  ! {}", anomaly);
        }
    }
    Ok(())
}

fn list_transports() {
    let registry = get_transport_registry();

    println!("Available transports:");
    println!();

    for transport in registry.transports() {
        println!("  {} ({})", transport.name, transport.display_name);
        println!("    {}", transport.description);
        for param in &transport.parameters {
            let req = if param.required { " (required)" } else { "" };
            println!("      - {}{}: {}", param.name, req, param.description);
        }
        println!();
    }
}

fn run_backfill(input: &Path, output: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .map_err(|e| ScanError::Config(format!("{}: {}", input.display(), e)))?;
    let mut export: LegacyExport = serde_json::from_str(&content)?;

    let catalog = Catalog::new();
    let summary = backfill(&catalog, &mut export)?;

    if let Some(output) = output {
        std::fs::write(output, serde_json::to_string_pretty(&export)?)?;
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
