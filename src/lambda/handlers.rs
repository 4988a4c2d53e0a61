//! Endpoint handlers and dispatch.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::error::{AppError, Result};
use crate::lambda::envelope::{ApiResponse, request_body};
use crate::models::Config;
use crate::pipeline::{
    collect_options, collect_space_info, jobs_from_payload, run_collect_rates, scan_reservations,
};
use crate::pricing::{RateQuery, run_rate_report};
use crate::reports::{
    id_list, options_report, run_sales_report, sales_queries_from_payload, space_info_report,
};
use crate::services::HtmlRateSource;
use crate::storage::RecordStore;
use crate::utils::http::PageFetcher;
use crate::utils::time::now_jst;

/// Shared clients, built once per cold start.
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    pub fetcher: Arc<dyn PageFetcher>,
}

impl AppContext {
    pub fn new(config: Config, store: Arc<dyn RecordStore>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            fetcher,
        }
    }
}

/// Deployable endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    CollectRates,
    GetSpaceRate,
    CollectSpaceInfo,
    GetSpaceInfo,
    CollectOptions,
    GetOptions,
    GetCompetitorSales,
    ScanReservations,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 8] = [
        Self::CollectRates,
        Self::GetSpaceRate,
        Self::CollectSpaceInfo,
        Self::GetSpaceInfo,
        Self::CollectOptions,
        Self::GetOptions,
        Self::GetCompetitorSales,
        Self::ScanReservations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectRates => "collect-rates",
            Self::GetSpaceRate => "get-space-rate",
            Self::CollectSpaceInfo => "collect-space-info",
            Self::GetSpaceInfo => "get-space-info",
            Self::CollectOptions => "collect-options",
            Self::GetOptions => "get-options",
            Self::GetCompetitorSales => "get-competitor-sales",
            Self::ScanReservations => "scan-reservations",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| AppError::config(format!("Unknown handler '{s}'")))
    }
}

/// Handle one event at the current JST time.
pub async fn dispatch(kind: HandlerKind, ctx: &AppContext, event: Value) -> ApiResponse {
    dispatch_at(kind, ctx, event, now_jst()).await
}

/// Handle one event as of `now`.
#[instrument(skip(ctx, event, now), fields(handler = %kind))]
pub async fn dispatch_at(
    kind: HandlerKind,
    ctx: &AppContext,
    event: Value,
    now: DateTime<FixedOffset>,
) -> ApiResponse {
    let result = match request_body(&event) {
        Ok(request) => route(kind, ctx, &request, now).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(body) => ApiResponse::ok(&body),
        Err(e) => {
            error!("{} failed: {}", kind, e);
            ApiResponse::from_error(&e)
        }
    }
}

async fn route(
    kind: HandlerKind,
    ctx: &AppContext,
    request: &Value,
    now: DateTime<FixedOffset>,
) -> Result<Value> {
    match kind {
        HandlerKind::CollectRates => collect_rates(ctx, request, now).await,
        HandlerKind::GetSpaceRate => get_space_rate(ctx, request).await,
        HandlerKind::CollectSpaceInfo => {
            let url = required_url(request)?;
            let summary = collect_space_info(
                ctx.fetcher.as_ref(),
                ctx.store.as_ref(),
                &ctx.config,
                &url,
                now,
            )
            .await?;
            Ok(serde_json::to_value(summary)?)
        }
        HandlerKind::GetSpaceInfo => {
            let room_ids = id_list(request, "room_ids")?;
            let report =
                space_info_report(ctx.store.as_ref(), &ctx.config, &room_ids, now.date_naive())
                    .await;
            Ok(serde_json::to_value(report)?)
        }
        HandlerKind::CollectOptions => {
            let url = required_url(request)?;
            let summary = collect_options(
                ctx.fetcher.as_ref(),
                ctx.store.as_ref(),
                &ctx.config,
                &url,
                now,
            )
            .await?;
            Ok(serde_json::to_value(summary)?)
        }
        HandlerKind::GetOptions => {
            let space_ids = id_list(request, "spaceIds")?;
            let report = options_report(ctx.store.as_ref(), &ctx.config, &space_ids).await;
            Ok(serde_json::to_value(report)?)
        }
        HandlerKind::GetCompetitorSales => {
            let (queries, single) = sales_queries_from_payload(request)?;
            let response =
                run_sales_report(ctx.store.as_ref(), &ctx.config, &queries, single, now).await;
            Ok(serde_json::to_value(response)?)
        }
        HandlerKind::ScanReservations => {
            let url = required_url(request)?;
            let scan = scan_reservations(ctx.fetcher.as_ref(), &ctx.config, &url, now).await?;
            Ok(serde_json::to_value(scan)?)
        }
    }
}

#[instrument(skip_all)]
async fn collect_rates(
    ctx: &AppContext,
    request: &Value,
    now: DateTime<FixedOffset>,
) -> Result<Value> {
    let jobs = jobs_from_payload(request, ctx.config.collector.scan_days)?;
    let source = HtmlRateSource::new(Arc::clone(&ctx.fetcher), &ctx.config);
    let summary = run_collect_rates(&source, ctx.store.as_ref(), &ctx.config, &jobs, now).await;
    info!(
        "Collected {} records, {} URLs failed",
        summary.records, summary.failed
    );
    Ok(serde_json::to_value(summary)?)
}

#[instrument(skip_all, fields(space_id))]
async fn get_space_rate(ctx: &AppContext, request: &Value) -> Result<Value> {
    let query = RateQuery::from_json(request, ctx.config.aggregation.max_range_days)?;
    tracing::Span::current().record("space_id", query.space_id.as_str());
    let report = run_rate_report(Arc::clone(&ctx.store), &ctx.config, &query).await?;
    Ok(serde_json::to_value(report)?)
}

fn required_url(request: &Value) -> Result<String> {
    request
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::validation("URL is required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayType, RateRecord, Slot};
    use crate::storage::{LocalStore, Table};
    use crate::utils::time::jst;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;

    struct NoPages;

    #[async_trait]
    impl PageFetcher for NoPages {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(AppError::scrape(url, "offline"))
        }
    }

    fn context(store: Arc<LocalStore>) -> AppContext {
        AppContext::new(Config::default(), store, Arc::new(NoPages))
    }

    fn now() -> DateTime<FixedOffset> {
        jst().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn seed_rate(store: &LocalStore, config: &Config, datetime: &str, price: u64) {
        let date = NaiveDate::parse_from_str(&datetime[..10], "%Y-%m-%d").unwrap();
        let hour: u32 = datetime[11..13].parse().unwrap();
        let slot = Slot::new(date, hour).unwrap();
        let record = RateRecord::new(
            "room1",
            "Studio",
            "https://example.com/rooms/room1",
            slot,
            "Standard",
            price,
            DayType::for_date(date, &[]),
            "2025-05-01T00:00:00+09:00",
        );
        store.insert(&Table::rates(&config.tables), record.into_item().unwrap());
    }

    #[test]
    fn test_handler_names() {
        for kind in HandlerKind::ALL {
            assert_eq!(kind.as_str().parse::<HandlerKind>().unwrap(), kind);
        }
        assert!("crawl".parse::<HandlerKind>().is_err());
    }

    #[tokio::test]
    async fn test_get_space_rate_through_proxy_event() {
        let store = Arc::new(LocalStore::in_memory());
        let ctx = context(Arc::clone(&store));
        // 2025-06-02 is a Monday
        seed_rate(&store, &ctx.config, "2025-06-02T10:00", 3000);

        let body = json!({
            "spaceId": "room1",
            "start_date": "2025-06-09",
            "end_date": "2025-06-09",
            "start_hour": "10",
            "end_hour": 10,
            "day_type": "weekday"
        });
        let event = json!({"body": body.to_string()});
        let response = dispatch_at(HandlerKind::GetSpaceRate, &ctx, event, now()).await;

        assert_eq!(response.status_code, 200);
        let value = response.json().unwrap();
        let plan = value["plans"].as_object().unwrap().values().next().unwrap();
        assert_eq!(plan["average_price"], 3000.0);
        assert_eq!(plan["samples_count"], 1);
    }

    #[tokio::test]
    async fn test_validation_errors_are_400() {
        let ctx = context(Arc::new(LocalStore::in_memory()));

        let response = dispatch_at(
            HandlerKind::GetSpaceRate,
            &ctx,
            json!({"spaceId": "room1"}),
            now(),
        )
        .await;
        assert_eq!(response.status_code, 400);

        let response =
            dispatch_at(HandlerKind::GetOptions, &ctx, json!({"body": "{oops"}), now()).await;
        assert_eq!(response.status_code, 400);

        let response = dispatch_at(HandlerKind::ScanReservations, &ctx, json!({}), now()).await;
        assert_eq!(response.status_code, 400);
        assert!(response.json().unwrap()["error"].is_string());
    }

    #[tokio::test]
    async fn test_store_outage_is_500() {
        let store = Arc::new(LocalStore::in_memory());
        store.fail_all(true);
        let ctx = context(Arc::clone(&store));
        let event = json!({
            "spaceId": "room1",
            "start_date": "2025-06-09",
            "end_date": "2025-06-09",
            "start_hour": 10,
            "end_hour": 11,
            "day_type": "weekday"
        });

        let response = dispatch_at(HandlerKind::GetSpaceRate, &ctx, event, now()).await;
        assert_eq!(response.status_code, 500);
    }

    #[tokio::test]
    async fn test_collect_rates_reports_failed_urls() {
        let ctx = context(Arc::new(LocalStore::in_memory()));
        let event = json!({
            "Records": [{"body": "{\"urls\": [\"https://example.com/rooms/a\"], \"scan_days\": 1}"}]
        });

        let response = dispatch_at(HandlerKind::CollectRates, &ctx, event, now()).await;
        assert_eq!(response.status_code, 200);
        let value = response.json().unwrap();
        assert_eq!(value["failed"], 1);
        assert_eq!(value["records"], 0);
    }

    #[tokio::test]
    async fn test_get_options_reports_missing_space() {
        let ctx = context(Arc::new(LocalStore::in_memory()));
        let event = json!({"body": "{\"spaceIds\": [\"r1\"]}"});

        let response = dispatch_at(HandlerKind::GetOptions, &ctx, event, now()).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.json().unwrap()["spaces"][0]["error"],
            "Space not found"
        );
    }
}
