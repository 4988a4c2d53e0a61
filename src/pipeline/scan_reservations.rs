//! Read-only scan of a competitor's reservation calendar.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use scraper::Html;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::models::{Config, ReservedRange};
use crate::services::{
    ScannedPlan, collapse_reserved, date_label, parse_reserved_flags, parse_scan_plans,
};
use crate::utils::http::PageFetcher;
use crate::utils::url::day_page_url;

/// Reserved ranges of one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayReservations {
    pub date: NaiveDate,
    pub label: String,
    pub reserved: Vec<ReservedRange>,
}

/// Result of a reservation scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationScan {
    pub url: String,
    /// Plans listed on the first date
    pub plans: Vec<ScannedPlan>,
    pub reserved_times: Vec<DayReservations>,
    pub timestamp: String,
}

/// Scan `collector.reservation_days` dates from today. A date that fails to
/// load reports no reservations. Nothing is written.
pub async fn scan_reservations(
    fetcher: &dyn PageFetcher,
    config: &Config,
    url: &str,
    now: DateTime<FixedOffset>,
) -> Result<ReservationScan> {
    let today = now.date_naive();
    let mut plans = Vec::new();
    let mut reserved_times = Vec::new();

    for offset in 0..config.collector.reservation_days {
        let date = today + Duration::days(i64::from(offset));
        let page_url = day_page_url(url, &config.scraper.rate_query, date, None);

        let reserved = match fetcher.fetch(&page_url).await {
            Ok(body) => {
                let document = Html::parse_document(&body);
                if offset == 0 {
                    plans = parse_scan_plans(&document, &config.selectors)?;
                }
                let flags = parse_reserved_flags(&document, &config.selectors)?;
                collapse_reserved(date, &flags)
            }
            Err(e) => {
                warn!("Reservation grid for {} unavailable: {}", date, e);
                Vec::new()
            }
        };
        reserved_times.push(DayReservations {
            date,
            label: date_label(date),
            reserved,
        });
    }

    Ok(ReservationScan {
        url: url.to_string(),
        plans,
        reserved_times,
        timestamp: now.to_rfc3339(),
    })
}
