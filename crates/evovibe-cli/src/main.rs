//! Evovibe - operator CLI for evolutionary vibration experiments
//!
//! ## Commands
//!
//! - `new-run`: start a run in the first free `run-NNN` folder
//! - `continue-run`: resume an interrupted run from its logs
//! - `status`: temperature of every worker
//! - `spread`: run the airflow of every worker
//! - `standby`: put every worker in standby
//! - `terminate`: end every worker session

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evovibe_core::{
    continue_run, load_experiment, load_workers, new_run, DeviceRegistry, EvovibeError,
    Experiment, Individual, RunFolder, TerminalOperator,
};
use evovibe_link::Command;
use evovibe_media::MediaToolkit;
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "evovibe")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evolve vibration stimuli that aggregate bees", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and command output
    #[arg(long, global = true)]
    json: bool,

    /// Experiment configuration
    #[arg(long, global = true, env = "EVOVIBE_CONFIG", default_value = "experiment.toml")]
    config: PathBuf,

    /// Worker addresses
    #[arg(long, global = true, env = "EVOVIBE_WORKERS", default_value = "workers.toml")]
    workers: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform a new experimental run
    NewRun {
        /// Directory holding the run folders
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Reuse run-001, discarding its contents
        #[arg(long)]
        debug: bool,
    },

    /// Continue a previous run from its logs
    ContinueRun {
        /// Run number to continue
        #[arg(short, long)]
        run: u32,

        /// Directory holding the run folders
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Show the temperature of every worker
    Status,

    /// Blow air through every arena
    Spread {
        /// Seconds of airflow
        #[arg(long)]
        seconds: f64,
    },

    /// Put every worker in standby
    Standby,

    /// End every worker session
    Terminate,
}

#[derive(Debug, Serialize)]
struct CasuTemperature {
    casu: u32,
    celsius: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    evovibe_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::NewRun { root, debug } => {
            cmd_new_run(&cli.config, &cli.workers, &root, debug, cli.json).await
        }
        Commands::ContinueRun { run, root } => {
            cmd_continue_run(&cli.config, &cli.workers, &root, run, cli.json).await
        }
        Commands::Status => {
            let registry = connect(&cli.workers).await?;
            cmd_status(&registry, cli.json).await
        }
        Commands::Spread { seconds } => {
            let registry = connect(&cli.workers).await?;
            cmd_broadcast(&registry, &Command::Spread { seconds }).await
        }
        Commands::Standby => {
            let registry = connect(&cli.workers).await?;
            cmd_broadcast(&registry, &Command::Standby).await
        }
        Commands::Terminate => {
            let registry = connect(&cli.workers).await?;
            cmd_broadcast(&registry, &Command::Terminate).await
        }
    }
}

async fn connect(workers: &Path) -> Result<DeviceRegistry> {
    let workers = load_workers(workers)
        .with_context(|| format!("Failed to load worker settings from {}", workers.display()))?;
    DeviceRegistry::connect(&workers)
        .await
        .context("Failed to connect to the workers")
}

async fn experiment(config: &Path, workers: &Path) -> Result<Experiment> {
    let config_file = config;
    let config = load_experiment(config_file).with_context(|| {
        format!("Failed to load experiment config from {}", config_file.display())
    })?;
    for advisory in config.advisories() {
        println!("note: {advisory}");
    }
    let media = MediaToolkit::system(config.image.fuzz_percent);
    Ok(Experiment {
        registry: connect(workers).await?,
        operator: Arc::new(TerminalOperator::new()),
        media,
        config,
    })
}

/// Start a new run
async fn cmd_new_run(
    config: &Path,
    workers: &Path,
    root: &Path,
    debug: bool,
    json: bool,
) -> Result<()> {
    let experiment = experiment(config, workers).await?;
    let debug_flag = debug;
    info!(root = %root.display(), debug = debug_flag, "starting a new run");
    report(new_run(root, debug, experiment).await, json)
}

/// Continue run `run`
async fn cmd_continue_run(
    config: &Path,
    workers: &Path,
    root: &Path,
    run: u32,
    json: bool,
) -> Result<()> {
    let experiment = experiment(config, workers).await?;
    info!(root = %root.display(), run, "continuing a run");
    report(continue_run(root, run, experiment).await, json)
}

fn report(
    outcome: std::result::Result<(RunFolder, Vec<Individual>), EvovibeError>,
    json: bool,
) -> Result<()> {
    match outcome {
        Ok((folder, population)) => {
            let best = population.first();
            if json {
                let summary = serde_json::json!({
                    "run": folder.name(),
                    "best_fitness": best.map(|i| i.fitness),
                    "best_genes": best.map(|i| i.candidate.genes().to_vec()),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n* ** The End");
                println!("Run: {}", folder.name());
                if let Some(best) = best {
                    println!("Best: {} @ {}", best.candidate, best.fitness);
                }
            }
            Ok(())
        }
        Err(EvovibeError::StoppedByOperator) => {
            println!("Run stopped. Continue it later with `evovibe continue-run --run N`.");
            Ok(())
        }
        Err(err) => Err(err).context("Run failed"),
    }
}

/// Print the temperature of every worker
async fn cmd_status(registry: &DeviceRegistry, json: bool) -> Result<()> {
    let temperatures: Vec<CasuTemperature> = registry
        .temperatures()
        .await
        .context("Failed to read worker temperatures")?
        .into_iter()
        .map(|(casu, celsius)| CasuTemperature { casu, celsius })
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&temperatures)?);
    } else {
        for t in &temperatures {
            println!("CASU #{:03}: {:.1} °C", t.casu, t.celsius);
        }
    }
    Ok(())
}

/// Send `command` to every worker
async fn cmd_broadcast(registry: &DeviceRegistry, command: &Command) -> Result<()> {
    registry
        .broadcast(command)
        .await
        .with_context(|| format!("Failed to send {} to the workers", command.name()))?;
    println!("{} sent to {} worker(s)", command.name(), registry.len());
    Ok(())
}
