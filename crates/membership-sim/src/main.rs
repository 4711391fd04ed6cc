//! membership-sim: Run a simulated group and report on its membership tables.
//!
//! Loads a scenario (or uses defaults), applies command-line overrides, runs
//! every tick, and prints the final report as JSON on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use membership_sim::{FailureMode, Scenario, Simulation};

#[derive(Parser, Debug)]
#[command(name = "membership-sim")]
#[command(about = "Gossip membership protocol simulator")]
struct Args {
    /// Scenario file (JSON). Defaults are used for anything it omits.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of nodes
    #[arg(short, long)]
    nodes: Option<u32>,

    /// Number of ticks to run
    #[arg(short, long)]
    ticks: Option<i64>,

    /// Failure to inject
    #[arg(short, long, value_enum)]
    failure: Option<FailureMode>,

    /// Drop messages during the scenario's drop window
    #[arg(long)]
    drop: bool,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Write the membership event log here
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn scenario(&self) -> Result<Scenario> {
        let mut scenario = match &self.config {
            Some(path) => Scenario::load(path)?,
            None => Scenario::default(),
        };

        if let Some(nodes) = self.nodes {
            scenario.nodes = nodes;
        }
        if let Some(ticks) = self.ticks {
            scenario.total_ticks = ticks;
        }
        if let Some(failure) = self.failure {
            scenario.failure = failure;
        }
        if self.drop {
            scenario.drop_messages = true;
        }
        if self.seed.is_some() {
            scenario.seed = self.seed;
        }
        if let Some(log) = &self.log {
            scenario.log_path = Some(log.display().to_string());
        }

        scenario.validate()?;
        Ok(scenario)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so the report on stdout stays machine-readable
    let default_filter = if args.verbose {
        "debug,membership_core=debug,membership_sim=debug"
    } else {
        "info,membership_core=warn,membership_sim=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let scenario = args.scenario()?;
    info!(
        nodes = scenario.nodes,
        ticks = scenario.total_ticks,
        failure = ?scenario.failure,
        drop = scenario.drop_messages,
        "Starting simulation"
    );

    let mut simulation = Simulation::new(scenario)?;
    let report = simulation.run();

    if let Some(path) = &simulation.scenario().log_path {
        simulation
            .log()
            .write_to(Path::new(path))
            .with_context(|| format!("Failed to write event log: {}", path))?;
        info!("Wrote {} events to {}", simulation.log().len(), path);
    }

    if !report.complete {
        warn!("Some surviving nodes are missing members");
    }
    if !report.accurate {
        warn!("Some surviving nodes still list failed members");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
