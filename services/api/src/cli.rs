use crate::infra::configured_sites;
use crate::routes::batch_outcome;
use crate::server;
use chrono::{Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use relief_ai::config::AppConfig;
use relief_ai::error::AppError;
use relief_ai::workflows::hazards::{
    EscalationDetector, EscalationPolicy, FileHazardFeed, JsonFileEscalationStore,
};
use relief_ai::workflows::resources::{
    BatchSettings, DepletionForecaster, ForecastBatchRunner, ForecastSettings, ForecastSnapshots,
    ResourceHistoryImporter,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Relief Coordination Service",
    about = "Hazard escalation, resource forecasting, service matching and feedback routing for refugee sites",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Hazard feed operations
    Hazards {
        #[command(subcommand)]
        command: HazardCommand,
    },
    /// Resource stock operations
    Resources {
        #[command(subcommand)]
        command: ResourceCommand,
    },
}

#[derive(Subcommand, Debug)]
enum HazardCommand {
    /// Run one escalation poll against a saved GeoJSON feed and print new alerts
    Poll(PollArgs),
}

#[derive(Subcommand, Debug)]
enum ResourceCommand {
    /// Fit every series in a resource history CSV and print depletion outcomes
    Forecast(ForecastArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
struct PollArgs {
    /// GeoJSON feature collection to read instead of the live feed
    #[arg(long)]
    feed: PathBuf,
    /// Escalation state file; defaults to the configured store
    #[arg(long)]
    store: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ForecastArgs {
    /// Resource history CSV
    #[arg(long)]
    history: PathBuf,
    /// First day of the alert window (YYYY-MM-DD); defaults to today
    #[arg(long)]
    reference: Option<NaiveDate>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Hazards {
            command: HazardCommand::Poll(args),
        } => poll_once(args),
        Command::Resources {
            command: ResourceCommand::Forecast(args),
        } => forecast_history(args).await,
    }
}

fn poll_once(args: PollArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store_path = args
        .store
        .unwrap_or_else(|| config.escalation.store_path.clone());
    let store = Arc::new(JsonFileEscalationStore::open(store_path)?);
    let detector = EscalationDetector::new(
        EscalationPolicy::from(&config.escalation),
        configured_sites(&config.catalogs)?,
        store,
    );

    let alerts = detector.poll(&FileHazardFeed::new(args.feed), Utc::now());
    if alerts.is_empty() {
        println!("No new or worsening hazards near monitored sites.");
        return Ok(());
    }
    for alert in &alerts {
        println!("{}\n{}\n", alert.subject(), alert.summary());
    }
    Ok(())
}

async fn forecast_history(args: ForecastArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let series = ResourceHistoryImporter::from_path(&args.history)?;
    let runner = ForecastBatchRunner::new(
        Arc::new(DepletionForecaster::new(ForecastSettings::from(&config.forecast))),
        Arc::new(ForecastSnapshots::default()),
        BatchSettings::from(&config.forecast),
    );

    let report = runner.run(series).await;
    let reference = args
        .reference
        .unwrap_or_else(|| Local::now().date_naive());
    let window_days = config.forecast.alert_window_days;

    println!("Resource outlook from {reference} ({window_days}-day alert window)");
    for entry in &report.entries {
        let outcome = batch_outcome(entry.key.clone(), &entry.outcome, reference, window_days);
        let detail = match (&outcome.depletion_date, &outcome.error) {
            (Some(date), _) => format!("depletes {date}"),
            (None, Some(error)) => format!("skipped: {error}"),
            (None, None) => "stays above threshold".to_string(),
        };
        let flag = if outcome.alert { "ALERT" } else { "ok" };
        println!("  [{flag:>5}] {}: {detail}", entry.key);
    }
    Ok(())
}
