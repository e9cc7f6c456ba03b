//! Vessel tracker service

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vessel_tracker::{
    config::{AppConfig, ScheduleConfig},
    database::Database,
    errors::TrackerError,
    ingest::{CycleFailure, CycleKind, CycleReport, Ingestor},
    models::VesselId,
    normalize::RawReport,
    scheduler::Scheduler,
    seed,
    source::{Source, DEFAULT_TIMESPAN_MINUTES},
};

#[derive(Debug, Parser)]
#[command(version, about = "Track vessel positions from a telemetry source")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh the fleet on a schedule until interrupted (default)
    Run,
    /// Run a single full fleet refresh
    Refresh,
    /// Fetch recent track data on demand
    Fetch {
        /// Restrict the fetch to one vessel
        #[arg(long)]
        mmsi: Option<String>,
        /// Look-back window in minutes
        #[arg(long, default_value_t = DEFAULT_TIMESPAN_MINUTES)]
        timespan: u32,
    },
    /// Load a JSON array of raw reports into the stores, or the built-in
    /// initial fleet when no file is given
    Seed { path: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    // Each section is validated by the component built from it. Failing to
    // reach the store at startup is the only fatal error.
    let db = Database::from_config(&config.database).await?;
    let source = Source::from_config(&config.source)?;
    let ingestor = Ingestor::new(db.clone(), source, &config.source);

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_service(ingestor, &config.schedule).await,
        Command::Refresh => print_cycle(ingestor.refresh_fleet().await),
        Command::Fetch { mmsi, timespan } => {
            let mmsi = mmsi.map(VesselId::try_from).transpose()?;
            print_cycle(ingestor.fetch_on_demand(mmsi, timespan).await)
        }
        Command::Seed { path } => {
            let raws = match &path {
                Some(path) => {
                    let raws = load_reports(path)?;
                    info!("Seeding {} reports from {}", raws.len(), path.display());
                    raws
                }
                None => {
                    let raws = seed::initial_fleet();
                    info!("Seeding {} reports of the initial fleet", raws.len());
                    raws
                }
            };
            print_cycle(ingestor.ingest(CycleKind::Seed, &raws).await)
        }
    };

    db.close().await;
    result
}

async fn run_service(
    ingestor: Ingestor<Source>,
    schedule: &ScheduleConfig,
) -> Result<(), TrackerError> {
    let scheduler = Scheduler::new(ingestor, schedule)?.spawn();

    tokio::select! {
        result = scheduler => {
            info!("Scheduler stopped: {:?}", result);
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }
    Ok(())
}

fn load_reports(path: &Path) -> Result<Vec<RawReport>, TrackerError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn print_cycle(result: Result<CycleReport, CycleFailure>) -> Result<(), TrackerError> {
    match result {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.report)?);
            Err(failure.error)
        }
    }
}
