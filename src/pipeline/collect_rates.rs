// src/pipeline/collect_rates.rs

//! Hourly rate collection.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::models::{Config, DayType, RateRecord, Slot};
use crate::pipeline::jobs::CollectJob;
use crate::services::RateSource;
use crate::storage::{RecordStore, Table};
use crate::utils::url::space_id_from_rooms_url;

/// Result of collecting one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlOutcome {
    pub url: String,
    #[serde(rename = "spaceId")]
    pub space_id: String,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a collection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectSummary {
    pub message: String,
    pub records: usize,
    pub failed: usize,
    pub urls: Vec<UrlOutcome>,
}

/// Map a start hour of `date` to the slot it denotes. Hours past midnight
/// (24 and above) belong to the next date.
pub fn observed_slot(date: NaiveDate, start_hour: u32) -> Option<Slot> {
    if start_hour >= 24 {
        Slot::new(date.succ_opt()?, start_hour - 24)
    } else {
        Slot::new(date, start_hour)
    }
}

/// Collect every job, URLs in parallel up to `scraper.max_concurrent`.
pub async fn run_collect_rates(
    source: &dyn RateSource,
    store: &dyn RecordStore,
    config: &Config,
    jobs: &[CollectJob],
    now: DateTime<FixedOffset>,
) -> CollectSummary {
    let concurrency = config.scraper.max_concurrent.max(1);
    let today = now.date_naive();

    let work: Vec<(&str, &CollectJob)> = jobs
        .iter()
        .flat_map(|job| job.urls.iter().map(move |url| (url.as_str(), job)))
        .collect();
    info!("Collecting rates for {} URLs", work.len());

    let mut outcomes: Vec<UrlOutcome> = stream::iter(work)
        .map(|(url, job)| async move {
            let start = today + chrono::Duration::days(job.offset_days);
            let space_id = space_id_from_rooms_url(url);
            match collect_url(source, store, config, url, start, job.scan_days, now).await {
                Ok(records) => UrlOutcome {
                    url: url.to_string(),
                    space_id,
                    records,
                    error: None,
                },
                Err(e) => {
                    warn!("Rate collection failed for {}: {}", url, e);
                    UrlOutcome {
                        url: url.to_string(),
                        space_id,
                        records: 0,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    outcomes.sort_by(|a, b| a.url.cmp(&b.url));

    let records = outcomes.iter().map(|o| o.records).sum();
    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    CollectSummary {
        message: format!("saved {records} records"),
        records,
        failed,
        urls: outcomes,
    }
}

/// Scrape `days` dates from `start` for one URL and write every observation.
///
/// Dates or hours that fail to load are skipped; write failures abort.
#[instrument(skip(source, store, config, now), fields(space_id))]
pub async fn collect_url(
    source: &dyn RateSource,
    store: &dyn RecordStore,
    config: &Config,
    url: &str,
    start: NaiveDate,
    days: u32,
    now: DateTime<FixedOffset>,
) -> Result<usize> {
    let space_id = space_id_from_rooms_url(url);
    tracing::Span::current().record("space_id", space_id.as_str());

    let table = Table::rates(&config.tables);
    let delay = Duration::from_millis(config.scraper.request_delay_ms);
    let holidays = &config.calendar.holidays;
    let created_at = now.to_rfc3339();

    let mut space_name: Option<String> = None;
    let mut loaded_days = 0;
    let mut written = 0;

    for offset in 0..days {
        let date = start + chrono::Duration::days(i64::from(offset));
        let listing = match source.day_listing(url, date).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Skipping {}: {}", date, e);
                continue;
            }
        };
        loaded_days += 1;
        let name = space_name.get_or_insert(listing.space_name).clone();

        for hour in listing.start_hours {
            let Some(slot) = observed_slot(date, hour) else {
                debug!("Ignoring start hour {} on {}", hour, date);
                continue;
            };
            let day_type = DayType::for_date(slot.date(), holidays);

            let plans = match source.plans(url, date, hour).await {
                Ok(plans) => plans,
                Err(e) => {
                    warn!("Skipping {} {}:00: {}", date, hour, e);
                    continue;
                }
            };
            for plan in plans {
                let record = RateRecord::new(
                    &space_id,
                    &name,
                    url,
                    slot,
                    &plan.name,
                    plan.price,
                    day_type,
                    &created_at,
                );
                store.put(&table, record.into_item()?).await?;
                written += 1;
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    if days > 0 && loaded_days == 0 {
        return Err(AppError::scrape(url, "no date could be loaded"));
    }
    info!("Wrote {} rate records for {}", written, space_id);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{DayListing, PlanPrice};
    use crate::storage::LocalStore;
    use crate::utils::time::jst;
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Every date offers 22:00, 23:00 and 24:00 with two plans.
    struct FakeSource {
        fail_dates: Vec<NaiveDate>,
    }

    #[async_trait]
    impl RateSource for FakeSource {
        async fn day_listing(&self, url: &str, date: NaiveDate) -> Result<DayListing> {
            if self.fail_dates.contains(&date) {
                return Err(AppError::scrape(url, "timeout"));
            }
            Ok(DayListing {
                space_name: "Studio".into(),
                start_hours: vec![22, 23, 24],
            })
        }

        async fn plans(&self, _url: &str, _date: NaiveDate, start_hour: u32) -> Result<Vec<PlanPrice>> {
            Ok(vec![
                PlanPrice {
                    name: "Standard".into(),
                    price: 1000 + u64::from(start_hour),
                },
                PlanPrice {
                    name: "Night".into(),
                    price: 0,
                },
            ])
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.scraper.request_delay_ms = 0;
        config
    }

    fn now() -> DateTime<FixedOffset> {
        // Friday 2025-06-06 09:00 JST
        jst().with_ymd_and_hms(2025, 6, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_observed_slot_rollover() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 6).unwrap();
        assert_eq!(observed_slot(date, 23).unwrap().to_string(), "2025-06-06T23:00");
        assert_eq!(observed_slot(date, 24).unwrap().to_string(), "2025-06-07T00:00");
        assert_eq!(observed_slot(date, 25).unwrap().to_string(), "2025-06-07T01:00");
        assert!(observed_slot(date, 48).is_none());
    }

    #[tokio::test]
    async fn test_collect_url_writes_records() {
        let store = LocalStore::in_memory();
        let source = FakeSource { fail_dates: vec![] };
        let config = config();
        let url = "https://www.spacemarket.com/spaces/s/rooms/room1/reservations/new";
        let start = now().date_naive();

        let written = collect_url(&source, &store, &config, url, start, 1, now())
            .await
            .unwrap();
        assert_eq!(written, 6);

        let table = Table::rates(&config.tables);
        let items = store.items(&table);
        let rolled: Vec<_> = items
            .iter()
            .filter(|i| i["datetime"] == "2025-06-07T00:00")
            .collect();
        assert_eq!(rolled.len(), 2);
        // Friday's 24:00 slot is Saturday
        assert!(rolled.iter().all(|i| i["day_type"] == "weekend"));
        assert!(
            items
                .iter()
                .filter(|i| i["datetime"] == "2025-06-06T22:00")
                .all(|i| i["day_type"] == "weekday")
        );
        assert!(items.iter().all(|i| i["spaceId"] == "room1" && i["name"] == "Studio"));
    }

    #[tokio::test]
    async fn test_run_reports_failures_per_url() {
        let store = LocalStore::in_memory();
        let start = now().date_naive();
        let source = FakeSource {
            fail_dates: vec![start],
        };
        let jobs = vec![CollectJob {
            urls: vec![
                "https://example.com/rooms/a".into(),
                "https://example.com/rooms/b".into(),
            ],
            offset_days: 0,
            scan_days: 1,
        }];

        let summary = run_collect_rates(&source, &store, &config(), &jobs, now()).await;
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.records, 0);

        let jobs = vec![CollectJob {
            offset_days: 1,
            scan_days: 2,
            ..jobs[0].clone()
        }];
        let summary = run_collect_rates(&source, &store, &config(), &jobs, now()).await;
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.records, 2 * 2 * 6);
        assert_eq!(summary.urls[0].space_id, "a");
    }

    #[tokio::test]
    async fn test_write_failure_aborts_url() {
        let store = LocalStore::in_memory();
        store.fail_all(true);
        let source = FakeSource { fail_dates: vec![] };
        let result = collect_url(
            &source,
            &store,
            &config(),
            "https://example.com/rooms/a",
            now().date_naive(),
            1,
            now(),
        )
        .await;
        assert!(result.is_err());
    }
}
