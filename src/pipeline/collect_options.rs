//! Add-on option collection with price history.

use chrono::{DateTime, FixedOffset};
use scraper::Html;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::{Config, OptionEntry, OptionHistoryRecord, OptionInfoRecord};
use crate::services::{detect_price_changes, parse_options};
use crate::storage::{ItemKey, RecordStore, Table, to_item};
use crate::utils::http::PageFetcher;
use crate::utils::url::room_uid;

/// Result of an option collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSummary {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    pub saved: usize,
    pub history: usize,
}

/// Scrape the option list, record price changes, and overwrite the
/// stored option list.
pub async fn collect_options(
    fetcher: &dyn PageFetcher,
    store: &dyn RecordStore,
    config: &Config,
    url: &str,
    now: DateTime<FixedOffset>,
) -> Result<OptionSummary> {
    let space_id = room_uid(url)
        .ok_or_else(|| AppError::validation("spaceId (room_uid) could not be read from the URL"))?;

    let body = fetcher.fetch(url).await?;
    let page = parse_options(&Html::parse_document(&body), &config.selectors)?;
    let timestamp = now.to_rfc3339();

    let info_table = Table::option_info(&config.tables);
    let previous = previous_options(store, &info_table, &space_id).await;
    let changes = detect_price_changes(&previous, &page.options);

    let history_table = Table::option_history(&config.tables);
    let mut history = 0;
    for change in changes {
        let record = OptionHistoryRecord {
            space_id: space_id.clone(),
            history_key: format!("{}#{}", timestamp, change.option_name),
            timestamp: timestamp.clone(),
            url: url.to_string(),
            change,
        };
        info!(
            "Price change for {}: {} -> {}",
            record.change.option_name, record.change.old_price, record.change.new_price
        );
        match store.put(&history_table, to_item(&record)?).await {
            Ok(()) => history += 1,
            Err(e) => warn!("History write failed for {}: {}", record.history_key, e),
        }
    }

    let saved = page.options.len();
    let record = OptionInfoRecord {
        space_id: space_id.clone(),
        name: page.space_name,
        url: url.to_string(),
        options: page.options,
        created_at: timestamp,
    };
    store.put(&info_table, to_item(&record)?).await?;

    Ok(OptionSummary {
        space_id,
        saved,
        history,
    })
}

/// Previously stored options; read failures count as none.
async fn previous_options(store: &dyn RecordStore, table: &Table, space_id: &str) -> Vec<OptionEntry> {
    match store.get(table, &ItemKey::partition_only(space_id)).await {
        Ok(Some(mut item)) => item
            .remove("options")
            .and_then(|options| serde_json::from_value::<Vec<OptionEntry>>(options).ok())
            .unwrap_or_default(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Reading previous options of {} failed: {}", space_id, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use crate::utils::time::jst;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    struct OnePage(String);

    #[async_trait]
    impl PageFetcher for OnePage {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn page(price: &str) -> OnePage {
        OnePage(format!(
            r#"<html><head><title>会議室C</title></head><body>
                <h2 id="room-options">オプション</h2>
                <ul><li class="css-zzxv54"><p class="css-l8u2g2">プロジェクター</p><p class="css-0">{price}</p></li></ul>
            </body></html>"#
        ))
    }

    const URL: &str = "https://www.spacemarket.com/spaces/s/?room_uid=r7";

    #[tokio::test]
    async fn test_first_scrape_has_no_history() {
        let store = LocalStore::in_memory();
        let config = Config::default();
        let now = jst().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let summary = collect_options(&page("1,100円"), &store, &config, URL, now)
            .await
            .unwrap();
        assert_eq!(
            summary,
            OptionSummary {
                space_id: "r7".into(),
                saved: 1,
                history: 0
            }
        );
        let stored = store.items(&Table::option_info(&config.tables));
        assert_eq!(stored[0]["name"], "会議室C");
        assert_eq!(stored[0]["options"], json!([{"name": "プロジェクター", "price": "1,100円"}]));
    }

    #[tokio::test]
    async fn test_price_change_is_recorded() {
        let store = LocalStore::in_memory();
        let config = Config::default();
        let first = jst().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let second = jst().with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();

        collect_options(&page("1,100円"), &store, &config, URL, first)
            .await
            .unwrap();
        let summary = collect_options(&page("1,650円"), &store, &config, URL, second)
            .await
            .unwrap();
        assert_eq!(summary.history, 1);

        let history = store.items(&Table::option_history(&config.tables));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["optionName"], "プロジェクター");
        assert_eq!(history[0]["oldPrice"], "1,100円");
        assert_eq!(history[0]["newPrice"], "1,650円");
        assert_eq!(
            history[0]["history_key"],
            "2025-06-02T12:00:00+09:00#プロジェクター"
        );
    }

    #[tokio::test]
    async fn test_missing_room_uid_is_rejected() {
        let store = LocalStore::in_memory();
        let now = jst().with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let err = collect_options(
            &page("1円"),
            &store,
            &Config::default(),
            "https://www.spacemarket.com/spaces/s/",
            now,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
