//! Replays the hidden-QE classifier over past years and reports every week
//! the signal switched ON.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};

use liquidity_signals::{
    fetch_history_inputs, history_window, FredClient, HiddenQeClassifier, HistoryScanner,
    Settings, YahooClient, MAX_HISTORY_YEARS,
};

#[derive(Parser)]
#[command(name = "hidden-qe-history")]
#[command(version, about = "Scan past hidden-QE signals for ON transitions", long_about = None)]
struct Args {
    /// Years of weekly history to scan
    #[arg(long, default_value = "5")]
    years: u32,

    /// FRED API key (defaults to FRED_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// CSV output path
    #[arg(long, default_value = "hidden_qe_history.csv")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args = Args::parse();
    let settings = Settings::load().context("loading settings")?;
    settings.validate()?;

    let years = args.years.clamp(1, MAX_HISTORY_YEARS);
    if years != args.years {
        warn!("--years {} out of range, using {}", args.years, years);
    }

    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let fred = FredClient::new(
        settings.endpoints.fred.clone(),
        args.api_key.or(settings.fred_api_key.clone()),
        timeout,
    )?;
    if !fred.has_api_key() {
        anyhow::bail!("a FRED API key is required (--api-key or FRED_API_KEY)");
    }
    let yahoo = YahooClient::new(settings.endpoints.yahoo.clone(), timeout)?;

    let (start, end) = history_window(years, Utc::now().date_naive());
    info!("Scanning hidden QE from {} to {}", start, end);

    let inputs = fetch_history_inputs(&fred, &yahoo, start, end).await?;
    info!(
        total_assets = inputs.total_assets.len(),
        treasury = inputs.treasury.len(),
        swaps = inputs.swaps.len(),
        usdjpy = inputs.usdjpy.len(),
        "Histories fetched"
    );

    let classifier = HiddenQeClassifier::new(settings.hidden_qe)?;
    let scan = HistoryScanner::new(classifier).scan(&inputs);

    info!(
        "{} weeks scanned, {} ON transitions ({} from WATCH)",
        scan.evaluations.len(),
        scan.transitions.len(),
        scan.watch_to_on.len()
    );
    for event in &scan.transitions {
        info!(
            "{} {} -> ON ({}/4) [{}]",
            event.date,
            event.from,
            event.score,
            event.conditions.flags()
        );
    }
    if scan.transitions.is_empty() {
        info!("No ON transitions in the period");
    }

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    scan.write_csv(BufWriter::new(file))
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("Wrote {}", args.output.display());

    Ok(())
}
