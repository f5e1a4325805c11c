use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, info};

use ringstat::probe::{LiteralNames, NameResolver};
use ringstat::snapshot::{ClusterSnapshot, SnapshotProbe};
use ringstat::status::{StatusError, StatusOptions, StatusReportController};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster snapshot to read (JSON or YAML); defaults to $RINGSTAT_SNAPSHOT,
    /// then the user cache directory
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Only log warnings and errors to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Print cluster information (state, load, IDs, ...)
    Status {
        /// The keyspace name
        keyspace: Option<String>,

        /// Show node domain names instead of IPs
        #[arg(short = 'r', long)]
        resolve_ip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.quiet { Level::WARN } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match args.command {
        Commands::Status {
            keyspace,
            resolve_ip,
        } => run_status(args.snapshot, StatusOptions { keyspace, resolve_ip }).await,
    }
}

async fn run_status(snapshot: Option<PathBuf>, options: StatusOptions) -> Result<()> {
    let path = ClusterSnapshot::resolve_path(snapshot)?;
    info!("Loading cluster snapshot from {:?}", path);

    let snapshot = ClusterSnapshot::load(&path).await?;
    let probe = SnapshotProbe::new(snapshot);

    let hostnames = probe.hostnames();
    let names: &dyn NameResolver = if options.resolve_ip {
        &hostnames
    } else {
        &LiteralNames
    };

    let controller = StatusReportController::new(&probe, names);
    match controller.run(&options).await {
        Ok(report) => {
            print!("{}", report.text);
            Ok(())
        }
        Err(StatusError::InvalidKeyspace(message)) => {
            println!("Error: {}", message);
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Failed to collect cluster status"),
    }
}
