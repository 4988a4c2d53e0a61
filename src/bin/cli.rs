//! spacewatch CLI
//!
//! Local execution entry point over a file-backed store. For AWS Lambda, use
//! `spacewatch-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spacewatch::{
    config::load_config,
    error::{AppError, Result},
    models::{RateRecord, Strategy},
    pipeline::{CollectJob, run_collect_rates},
    pricing::{RateQuery, run_rate_report},
    reports::{SalesQuery, run_sales_report},
    services::HtmlRateSource,
    storage::{LocalStore, RecordStore, Table},
    utils::{http::HttpFetcher, time::now_jst},
};

/// spacewatch - Rental space rate collector
#[derive(Parser, Debug)]
#[command(
    name = "spacewatch",
    version,
    about = "Rental space rate collector and price aggregator"
)]
struct Cli {
    /// Directory holding the local tables
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Config file (default: {data_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration file
    Validate,

    /// Average plan prices over a date and hour range
    Rates {
        #[arg(long)]
        space_id: String,
        #[arg(long)]
        start_date: NaiveDate,
        #[arg(long)]
        end_date: NaiveDate,
        #[arg(long)]
        start_hour: u32,
        #[arg(long)]
        end_hour: u32,
        /// weekday or weekend
        #[arg(long, default_value = "weekday")]
        day_type: String,
        /// Resolve key by key instead of in batches
        #[arg(long)]
        sequential: bool,
    },

    /// Scrape rates for a listing into the local store
    CollectRates {
        #[arg(long)]
        url: Vec<String>,
        /// Days to scan (default: collector.scan_days)
        #[arg(long)]
        days: Option<u32>,
        /// Start this many days from today
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show competitor sales for the coming window
    Sales {
        #[arg(long)]
        space_id: String,
        #[arg(long)]
        plan_id: Option<String>,
    },

    /// Load rate records from a JSON array file
    ImportRates {
        #[arg(long)]
        file: PathBuf,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("config.toml"));
    let mut config = load_config(&config_path)?;
    info!("Loaded configuration from {}", config_path.display());

    let store = Arc::new(LocalStore::open(&cli.data_dir));

    match cli.command {
        Command::Validate => {
            config.validate()?;
            info!("Configuration is valid");
        }

        Command::Rates {
            space_id,
            start_date,
            end_date,
            start_hour,
            end_hour,
            day_type,
            sequential,
        } => {
            if sequential {
                config.aggregation.strategy = Strategy::Sequential;
            }
            let body = json!({
                "spaceId": space_id,
                "start_date": start_date.to_string(),
                "end_date": end_date.to_string(),
                "start_hour": start_hour,
                "end_hour": end_hour,
                "day_type": day_type,
            });
            let query = RateQuery::from_json(&body, config.aggregation.max_range_days)?;
            let report = run_rate_report(store, &config, &query).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::CollectRates { url, days, offset } => {
            if url.is_empty() {
                return Err(AppError::validation("at least one --url is required"));
            }
            let fetcher = Arc::new(HttpFetcher::new(&config.scraper)?);
            let source = HtmlRateSource::new(fetcher, &config);
            let jobs = vec![CollectJob {
                urls: url,
                offset_days: offset,
                scan_days: days.unwrap_or(config.collector.scan_days),
            }];
            let summary =
                run_collect_rates(&source, store.as_ref(), &config, &jobs, now_jst()).await;
            if summary.failed > 0 {
                warn!("{} URLs failed", summary.failed);
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Sales { space_id, plan_id } => {
            let queries = [SalesQuery { space_id, plan_id }];
            let response =
                run_sales_report(store.as_ref(), &config, &queries, true, now_jst()).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Command::ImportRates { file } => {
            let content = std::fs::read_to_string(&file)?;
            let records: Vec<RateRecord> = serde_json::from_str(&content)?;
            let table = Table::rates(&config.tables);
            let count = records.len();
            for record in records {
                store.put(&table, record.into_item()?).await?;
            }
            info!("Imported {} rate records from {}", count, file.display());
        }
    }

    Ok(())
}
