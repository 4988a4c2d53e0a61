//! Venue detail collection.

use chrono::{DateTime, Duration, FixedOffset};
use scraper::Html;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::models::{Config, SpaceInfoRecord};
use crate::services::parse_space_details;
use crate::storage::{RecordStore, Table, to_item};
use crate::utils::http::PageFetcher;
use crate::utils::url::space_id_from_room_uid;

/// Result of a venue detail collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceInfoSummary {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    pub name: String,
    pub start_date: String,
    pub days: u32,
}

/// Scrape the venue page once and write one row per day for the coming
/// `collector.space_info_days` days, each expiring after `space_info_ttl_days`.
pub async fn collect_space_info(
    fetcher: &dyn PageFetcher,
    store: &dyn RecordStore,
    config: &Config,
    url: &str,
    now: DateTime<FixedOffset>,
) -> Result<SpaceInfoSummary> {
    let body = fetcher.fetch(url).await?;
    let details = parse_space_details(&Html::parse_document(&body), &config.selectors)?;
    let space_id = space_id_from_room_uid(url);
    let table = Table::space_info(&config.tables);
    let ttl = Duration::days(i64::from(config.collector.space_info_ttl_days));

    for offset in 0..config.collector.space_info_days {
        let at = now + Duration::days(i64::from(offset));
        let record = SpaceInfoRecord {
            space_id: space_id.clone(),
            date: at.format("%Y-%m-%d").to_string(),
            name: details.name.clone(),
            url: url.to_string(),
            location: details.location.clone(),
            station: details.station.clone(),
            capacity: details.capacity.clone(),
            stay_capacity: details.stay_capacity.clone(),
            floor_space: details.floor_space.clone(),
            space_type: details.space_type.clone(),
            excluded_morning: false,
            point: 1.0,
            created_at: at.to_rfc3339(),
            expire_at: (at + ttl).timestamp(),
        };
        store.put(&table, to_item(&record)?).await?;
    }

    info!(
        "Stored {} days of venue details for {} ({})",
        config.collector.space_info_days, details.name, space_id
    );
    Ok(SpaceInfoSummary {
        space_id,
        name: details.name,
        start_date: now.format("%Y-%m-%d").to_string(),
        days: config.collector.space_info_days,
    })
}
