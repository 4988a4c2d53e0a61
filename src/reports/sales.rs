//! Competitor sales over the coming sales window.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::models::{Config, SalesRecord};
use crate::storage::{Item, Query, RecordStore, Table, query_all};

/// One space, optionally narrowed to one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesQuery {
    pub space_id: String,
    pub plan_id: Option<String>,
}

impl SalesQuery {
    fn from_value(value: &Value) -> Result<Self> {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let space_id =
            text("spaceId").ok_or_else(|| AppError::validation("spaceId is required"))?;
        Ok(Self {
            space_id,
            plan_id: text("planId"),
        })
    }
}

/// Parse `{queries: [...]}`, or a single `{spaceId, planId?}` object.
///
/// The second value tells whether the request used the single-query form.
pub fn sales_queries_from_payload(body: &Value) -> Result<(Vec<SalesQuery>, bool)> {
    match body.get("queries") {
        Some(Value::Array(queries)) if !queries.is_empty() => {
            let queries = queries
                .iter()
                .map(SalesQuery::from_value)
                .collect::<Result<Vec<_>>>()?;
            Ok((queries, false))
        }
        Some(_) => Err(AppError::validation("queries must be a non-empty array")),
        None => Ok((vec![SalesQuery::from_value(body)?], true)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reservation {
    pub start_time: String,
    pub end_time: String,
    pub price: u64,
    #[serde(rename = "planDisplayName")]
    pub plan_display_name: String,
    pub processed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: String,
    pub total_sales: u64,
    pub reservation_count: usize,
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub total_sales: u64,
    pub total_reservations: usize,
    pub average_daily_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Period {
    pub start: String,
    pub end: String,
}

/// Sales of one plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSales {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    #[serde(rename = "planId")]
    pub plan_id: String,
    pub summary: SalesSummary,
    pub daily_sales: Vec<DailySales>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlanResult {
    Ok(PlanSales),
    Failed {
        #[serde(rename = "spaceId")]
        space_id: String,
        #[serde(rename = "planId")]
        plan_id: Option<String>,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySummary {
    pub total_queries: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SalesResponse {
    /// Single-query form with exactly one plan that succeeded
    Single {
        #[serde(rename = "spaceId")]
        space_id: String,
        #[serde(rename = "planId")]
        plan_id: String,
        period: Period,
        summary: SalesSummary,
        daily_sales: Vec<DailySales>,
        timestamp: String,
    },
    Multi {
        period: Period,
        summary: QuerySummary,
        results: Vec<PlanResult>,
        timestamp: String,
    },
}

/// Build the sales report for every query.
///
/// The window runs from today to today plus `sales_window_days`, inclusive.
/// Failures are reported per plan and never abort the report.
#[instrument(skip_all, fields(queries = queries.len()))]
pub async fn run_sales_report(
    store: &dyn RecordStore,
    config: &Config,
    queries: &[SalesQuery],
    single: bool,
    now: DateTime<FixedOffset>,
) -> SalesResponse {
    let table = Table::sales(&config.tables);
    let window_days = config.aggregation.sales_window_days;
    let start = now.date_naive();
    let end = start + Duration::days(i64::from(window_days));

    let mut results = Vec::new();
    for query in queries {
        let plan_ids = match &query.plan_id {
            Some(plan_id) => vec![plan_id.clone()],
            None => match plan_ids_for_space(store, &table, &query.space_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Listing plans of {} failed: {}", query.space_id, e);
                    results.push(PlanResult::Failed {
                        space_id: query.space_id.clone(),
                        plan_id: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            },
        };

        for plan_id in plan_ids {
            let result =
                match plan_sales(store, &table, &query.space_id, &plan_id, start, end, window_days)
                    .await
                {
                    Ok(sales) => PlanResult::Ok(sales),
                    Err(e) => {
                        warn!("Sales of {}/{} failed: {}", query.space_id, plan_id, e);
                        PlanResult::Failed {
                            space_id: query.space_id.clone(),
                            plan_id: Some(plan_id),
                            error: e.to_string(),
                        }
                    }
                };
            results.push(result);
        }
    }

    let period = Period {
        start: start.to_string(),
        end: end.to_string(),
    };
    let timestamp = now.to_rfc3339();
    let successful = results
        .iter()
        .filter(|r| matches!(r, PlanResult::Ok(_)))
        .count();
    info!("Sales report: {} of {} plans succeeded", successful, results.len());

    if single && results.len() == 1 && matches!(results[0], PlanResult::Ok(_)) {
        if let Some(PlanResult::Ok(sales)) = results.pop() {
            return SalesResponse::Single {
                space_id: sales.space_id,
                plan_id: sales.plan_id,
                period,
                summary: sales.summary,
                daily_sales: sales.daily_sales,
                timestamp,
            };
        }
    }
    SalesResponse::Multi {
        period,
        summary: QuerySummary {
            total_queries: results.len(),
            successful,
            failed: results.len() - successful,
        },
        results,
        timestamp,
    }
}

/// Distinct plan ids of a space, from the sort key prefixes.
pub async fn plan_ids_for_space(
    store: &dyn RecordStore,
    table: &Table,
    space_id: &str,
) -> Result<Vec<String>> {
    let query = Query::partition(space_id).with_projection(&["sortKey"]);
    let items = query_all(store, table, query).await?;
    let ids: BTreeSet<String> = items
        .iter()
        .filter_map(|item| item.get("sortKey").and_then(Value::as_str))
        .filter_map(|key| key.split_once('#').map(|(plan, _)| plan.to_string()))
        .collect();
    Ok(ids.into_iter().collect())
}

/// Read, dedupe and summarize one plan's reservations.
pub async fn plan_sales(
    store: &dyn RecordStore,
    table: &Table,
    space_id: &str,
    plan_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    window_days: u32,
) -> Result<PlanSales> {
    let query = Query::partition(space_id).with_prefix(format!("{plan_id}#"));
    let items = query_all(store, table, query).await?;
    let records = items.into_iter().filter_map(record_of);
    let (summary, daily_sales) = summarize(records, start, end, window_days);
    Ok(PlanSales {
        space_id: space_id.to_string(),
        plan_id: plan_id.to_string(),
        summary,
        daily_sales,
    })
}

fn record_of(item: Item) -> Option<SalesRecord> {
    serde_json::from_value(Value::Object(item)).ok()
}

/// Dedupe by `(date, start_time)` keeping the latest `processed_at`, clip to
/// the window, then group by date.
pub fn summarize(
    records: impl IntoIterator<Item = SalesRecord>,
    start: NaiveDate,
    end: NaiveDate,
    window_days: u32,
) -> (SalesSummary, Vec<DailySales>) {
    let mut latest: HashMap<(String, String), SalesRecord> = HashMap::new();
    for record in records {
        if record.reservation_date.is_empty() || record.start_time.is_empty() {
            continue;
        }
        let key = (record.reservation_date.clone(), record.start_time.clone());
        match latest.get(&key) {
            Some(kept) if kept.processed_at >= record.processed_at => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut days: BTreeMap<String, DailySales> = BTreeMap::new();
    for record in latest.into_values() {
        let Ok(date) = NaiveDate::parse_from_str(&record.reservation_date, "%Y-%m-%d") else {
            continue;
        };
        if date < start || date > end {
            continue;
        }
        let day = days
            .entry(record.reservation_date.clone())
            .or_insert_with(|| DailySales {
                date: record.reservation_date.clone(),
                total_sales: 0,
                reservation_count: 0,
                reservations: Vec::new(),
            });
        day.total_sales += record.price;
        day.reservation_count += 1;
        day.reservations.push(Reservation {
            start_time: record.start_time,
            end_time: record.end_time,
            price: record.price,
            plan_display_name: record.plan_display_name,
            processed_at: record.processed_at,
        });
    }

    let mut daily: Vec<DailySales> = days.into_values().collect();
    for day in &mut daily {
        day.reservations
            .sort_by(|a, b| a.start_time.cmp(&b.start_time));
    }

    let total_sales: u64 = daily.iter().map(|d| d.total_sales).sum();
    let total_reservations = daily.iter().map(|d| d.reservation_count).sum();
    let average_daily_sales = if total_sales == 0 {
        0.0
    } else {
        total_sales as f64 / f64::from(window_days + 1)
    };

    (
        SalesSummary {
            total_sales,
            total_reservations,
            average_daily_sales,
        },
        daily,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use crate::utils::time::jst;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(date: &str, start: &str, price: u64, processed_at: &str) -> SalesRecord {
        SalesRecord {
            space_id: "room1".into(),
            sort_key: format!("plan_a#{date}#{start}"),
            reservation_date: date.into(),
            start_time: start.into(),
            end_time: "".into(),
            price,
            plan_display_name: "Day".into(),
            processed_at: processed_at.into(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        jst().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_payload_forms() {
        let (queries, single) =
            sales_queries_from_payload(&json!({"spaceId": "room1", "planId": "plan_a"})).unwrap();
        assert!(single);
        assert_eq!(queries[0].plan_id.as_deref(), Some("plan_a"));

        let (queries, single) = sales_queries_from_payload(&json!({
            "queries": [{"spaceId": "room1"}, {"spaceId": "room2", "planId": "p"}]
        }))
        .unwrap();
        assert!(!single);
        assert_eq!(queries.len(), 2);
        assert!(queries[0].plan_id.is_none());

        let err = sales_queries_from_payload(&json!({"queries": [{"planId": "p"}]})).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(sales_queries_from_payload(&json!({})).is_err());
        assert!(sales_queries_from_payload(&json!({"queries": []})).is_err());
    }

    #[test]
    fn test_dedupe_keeps_latest_processing() {
        let records = vec![
            record("2025-06-02", "10:00", 3000, "2025-06-01T01:00:00"),
            record("2025-06-02", "10:00", 3500, "2025-06-01T05:00:00"),
            record("2025-06-02", "10:00", 2000, "2025-06-01T03:00:00"),
            record("2025-06-02", "13:00", 1000, "2025-06-01T01:00:00"),
        ];
        let (summary, daily) = summarize(records, day("2025-06-01"), day("2025-06-15"), 14);

        assert_eq!(summary.total_sales, 4500);
        assert_eq!(summary.total_reservations, 2);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].reservations[0].price, 3500);
        assert_eq!(daily[0].reservations[1].start_time, "13:00");
        assert!((summary.average_daily_sales - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_and_incomplete_rows() {
        let records = vec![
            record("2025-05-31", "10:00", 100, "a"),
            record("2025-06-01", "10:00", 200, "a"),
            record("2025-06-15", "10:00", 300, "a"),
            record("2025-06-16", "10:00", 400, "a"),
            record("2025-06-03", "", 500, "a"),
            record("", "10:00", 999, "x"),
        ];
        let (summary, daily) = summarize(records, day("2025-06-01"), day("2025-06-15"), 14);

        let dates: Vec<&str> = daily.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-06-01", "2025-06-15"]);
        assert_eq!(summary.total_sales, 500);
    }

    #[test]
    fn test_empty_average_is_zero() {
        let (summary, daily) =
            summarize(Vec::new(), day("2025-06-01"), day("2025-06-15"), 14);
        assert!(daily.is_empty());
        assert_eq!(summary.average_daily_sales, 0.0);
    }

    async fn seeded_store(config: &Config) -> LocalStore {
        let store = LocalStore::in_memory();
        let table = Table::sales(&config.tables);
        for (plan, date, start, price) in [
            ("plan_a", "2025-06-02", "10:00", 3000),
            ("plan_a", "2025-06-03", "09:00", 1500),
            ("plan_b", "2025-06-02", "18:00", 6000),
        ] {
            store.insert(
                &table,
                json!({
                    "spaceId": "room1",
                    "sortKey": format!("{plan}#{date}#{start}"),
                    "reservationDate": date,
                    "start_time": start,
                    "end_time": "",
                    "price": price,
                    "planDisplayName": plan,
                    "processed_at": "2025-06-01T00:00:00"
                })
                .as_object()
                .unwrap()
                .clone(),
            );
        }
        store
    }

    #[tokio::test]
    async fn test_single_query_shape() {
        let config = Config::default();
        let store = seeded_store(&config).await;
        let (queries, single) =
            sales_queries_from_payload(&json!({"spaceId": "room1", "planId": "plan_a"})).unwrap();

        let response = run_sales_report(&store, &config, &queries, single, now()).await;
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["spaceId"], "room1");
        assert_eq!(value["planId"], "plan_a");
        assert_eq!(value["period"], json!({"start": "2025-06-01", "end": "2025-06-15"}));
        assert_eq!(value["summary"]["total_sales"], 4500);
        assert_eq!(value["daily_sales"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_plans_listed_from_sort_keys() {
        let config = Config::default();
        let store = seeded_store(&config).await;
        let (queries, single) = sales_queries_from_payload(&json!({"spaceId": "room1"})).unwrap();

        let response = run_sales_report(&store, &config, &queries, single, now()).await;
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(
            value["summary"],
            json!({"total_queries": 2, "successful": 2, "failed": 0})
        );
        assert_eq!(value["results"][0]["planId"], "plan_a");
        assert_eq!(value["results"][1]["summary"]["total_sales"], 6000);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_per_query() {
        let config = Config::default();
        let store = seeded_store(&config).await;
        store.fail_all(true);
        let (queries, single) =
            sales_queries_from_payload(&json!({"spaceId": "room1", "planId": "plan_a"})).unwrap();

        let response = run_sales_report(&store, &config, &queries, single, now()).await;
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["results"][0]["spaceId"], "room1");
        assert!(value["results"][0]["error"].is_string());
    }
}
