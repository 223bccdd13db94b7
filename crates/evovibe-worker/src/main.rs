//! `evovibe-worker`: serve one device to the experiment master.

use anyhow::{Context, Result};
use clap::Parser;
use evovibe_link::init_tracing;
use evovibe_worker::{serve_tcp, SimulatedCasu, Worker};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "evovibe-worker")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Device worker for evovibe experiments", long_about = None)]
struct Args {
    /// Address to accept the master on
    #[arg(long, env = "EVOVIBE_WORKER_LISTEN", default_value = "0.0.0.0:5555")]
    listen: String,

    /// CASU number, used in log lines
    #[arg(long, default_value_t = 1)]
    casu_number: u32,

    /// Temperature reported by the simulated device
    #[arg(long, default_value_t = 28.0)]
    simulated_temperature: f64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(
        args.json,
        if args.verbose { Level::DEBUG } else { Level::INFO },
    );

    let name = format!("casu-{:03}", args.casu_number);
    let mut worker = Worker::new(name.clone(), SimulatedCasu::new(args.simulated_temperature));
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to listen on {}", args.listen))?;
    info!(worker = %name, listen = %args.listen, "worker started");

    let outcome = tokio::select! {
        served = serve_tcp(listener, &mut worker) => served.context("worker session failed"),
        _ = tokio::signal::ctrl_c() => {
            warn!(worker = %name, "interrupted");
            Ok(())
        }
    };

    if !worker.is_terminated() {
        worker.release().context("failed to release device")?;
    }
    info!(worker = %name, "worker stopped");
    outcome
}
