//! AWS Lambda entry point for spacewatch
//!
//! Deploy with `cargo lambda build --release --features lambda`. Each function
//! sets `SPACEWATCH_HANDLER` to the endpoint it serves, e.g. `get-space-rate`.
//!
//! ## Environment Variables
//!
//! - `SPACEWATCH_HANDLER`: Endpoint served by this function
//! - `CONFIG_PATH`: Optional TOML config bundled with the function
//! - `TABLE_NAME` / `RATE_TABLE`, `SALES_TABLE`, `SPACE_INFO_TABLE`,
//!   `OPTION_INFO_TABLE`, `OPTION_HISTORY_TABLE`: Table names
//! - `AGGREGATION_STRATEGY`: `batched` (default) or `sequential`
//! - `CRAWL_TIMEOUT_SECS`, `MAX_CONCURRENT`, `REQUEST_DELAY_MS`: Scraper tuning
//! - `RUST_LOG`: Log level (e.g., `info`, `debug`)

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spacewatch::config::config_from_env;
use spacewatch::error::AppError;
use spacewatch::lambda::{ApiResponse, AppContext, HandlerKind, dispatch};
use spacewatch::storage::dynamodb::DynamoStore;
use spacewatch::utils::http::HttpFetcher;

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let kind: HandlerKind = std::env::var("SPACEWATCH_HANDLER")
        .map_err(|_| AppError::config("SPACEWATCH_HANDLER is not set"))?
        .parse()?;
    let config = config_from_env()?;
    let fetcher = Arc::new(HttpFetcher::new(&config.scraper)?);
    let store = Arc::new(DynamoStore::from_env().await);
    let ctx = Arc::new(AppContext::new(config, store, fetcher));

    info!("spacewatch {} starting...", kind);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let ctx = Arc::clone(&ctx);
        async move { Ok::<ApiResponse, LambdaError>(dispatch(kind, &ctx, event.payload).await) }
    }))
    .await
}
