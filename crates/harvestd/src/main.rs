//! harvestd — the HarvestGrid daemon.
//!
//! Single binary that assembles the scheduling subsystems:
//! - Capacity pool + lifecycle counters (owned by the scheduler)
//! - Strategy calculator, timing planner, task distributor
//! - A fleet to run against (standalone mode wires in the simulator)
//!
//! # Usage
//!
//! ```text
//! harvestd standalone --nodes 12 --targets 8 --cycles 20
//! ```

mod sim;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use harvest_core::HarvestConfig;
use harvestgrid_scheduler::Scheduler;

use crate::sim::SimFleet;

#[derive(Parser)]
#[command(name = "harvestd", about = "HarvestGrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler against a simulated fleet in one process.
    Standalone {
        /// Path to harvest.toml; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of simulated worker nodes.
        #[arg(long, default_value = "12")]
        nodes: usize,

        /// Number of simulated targets.
        #[arg(long, default_value = "8")]
        targets: usize,

        /// Fleet generation seed.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Run this many cycles, print final status, and exit.
        /// Omit to run until Ctrl-C.
        #[arg(long)]
        cycles: Option<u64>,

        /// Override the configured cycle interval in milliseconds.
        #[arg(long)]
        cycle_interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvestd=debug,harvestgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            config,
            nodes,
            targets,
            seed,
            cycles,
            cycle_interval_ms,
        } => run_standalone(config, nodes, targets, seed, cycles, cycle_interval_ms).await,
    }
}

async fn run_standalone(
    config_path: Option<PathBuf>,
    nodes: usize,
    targets: usize,
    seed: u64,
    cycles: Option<u64>,
    cycle_interval_ms: Option<u64>,
) -> anyhow::Result<()> {
    info!("HarvestGrid daemon starting in standalone mode");

    let mut config = match &config_path {
        Some(path) => HarvestConfig::from_file(path)?,
        None => HarvestConfig::default(),
    };
    if let Some(ms) = cycle_interval_ms {
        config.scheduler.cycle_interval_ms = ms;
    }
    info!(config = ?config_path, "configuration loaded");

    // Simulated fleet implements all three collaborator interfaces.
    let fleet = Arc::new(SimFleet::generate(seed, nodes, targets, config.ops.clone()));
    info!(nodes, targets, seed, "simulated fleet ready");

    let interval = config.scheduler.cycle_interval();
    let mut scheduler = Scheduler::new(config, fleet.clone(), fleet.clone(), fleet);
    info!("scheduler initialized");

    match cycles {
        Some(n) => {
            for _ in 0..n {
                let launched = scheduler.tick();
                info!(cycle = scheduler.status().cycle, launched, "cycle complete");
                tokio::time::sleep(interval).await;
            }
            println!("{}", serde_json::to_string_pretty(&scheduler.status())?);
        }
        None => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received");
                    let _ = shutdown_tx.send(true);
                }
            });
            scheduler.run(shutdown_rx).await;
            println!("{}", serde_json::to_string_pretty(&scheduler.status())?);
        }
    }

    Ok(())
}
