// src/services/rates.rs

//! Hourly plan prices from the reservation page.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::Html;
use tracing::debug;

use crate::error::Result;
use crate::models::{Config, SelectorConfig};
use crate::services::{element_text, parse_selector};
use crate::utils::http::PageFetcher;
use crate::utils::parse_price;
use crate::utils::url::day_page_url;

/// One plan offered for a start hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrice {
    pub name: String,
    pub price: u64,
}

/// What the reservation page shows for one date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayListing {
    pub space_name: String,
    /// Bookable start hours, ascending. Values of 24 and above belong to the next date.
    pub start_hours: Vec<u32>,
}

/// Source of rate observations for a space.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Space name and bookable start hours on `date`.
    async fn day_listing(&self, url: &str, date: NaiveDate) -> Result<DayListing>;

    /// Plans and prices for a one-hour booking starting at `start_hour` on `date`.
    async fn plans(&self, url: &str, date: NaiveDate, start_hour: u32) -> Result<Vec<PlanPrice>>;
}

/// [`RateSource`] that reads server-rendered reservation pages.
pub struct HtmlRateSource {
    fetcher: Arc<dyn PageFetcher>,
    selectors: SelectorConfig,
    query_template: String,
}

impl HtmlRateSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            selectors: config.selectors.clone(),
            query_template: config.scraper.rate_query.clone(),
        }
    }

    fn page_url(&self, url: &str, date: NaiveDate, start_hour: Option<u32>) -> String {
        day_page_url(url, &self.query_template, date, start_hour)
    }
}

#[async_trait]
impl RateSource for HtmlRateSource {
    async fn day_listing(&self, url: &str, date: NaiveDate) -> Result<DayListing> {
        let body = self.fetcher.fetch(&self.page_url(url, date, None)).await?;
        let document = Html::parse_document(&body);
        Ok(DayListing {
            space_name: parse_space_name(&document, &self.selectors)?,
            start_hours: parse_start_hours(&document, &self.selectors)?,
        })
    }

    async fn plans(&self, url: &str, date: NaiveDate, start_hour: u32) -> Result<Vec<PlanPrice>> {
        let body = self
            .fetcher
            .fetch(&self.page_url(url, date, Some(start_hour)))
            .await?;
        let document = Html::parse_document(&body);
        let plans = parse_plans(&document, &self.selectors)?;
        debug!("{} plans at {} {}:00", plans.len(), date, start_hour);
        Ok(plans)
    }
}

/// Space name, empty when the page has none.
pub fn parse_space_name(document: &Html, selectors: &SelectorConfig) -> Result<String> {
    let sel = parse_selector(&selectors.space_name)?;
    Ok(document
        .select(&sel)
        .next()
        .map(element_text)
        .unwrap_or_default())
}

/// Enabled start hours of the dropdown, sorted and deduplicated.
pub fn parse_start_hours(document: &Html, selectors: &SelectorConfig) -> Result<Vec<u32>> {
    let sel = parse_selector(&selectors.start_hour_options)?;
    let mut hours: Vec<u32> = document
        .select(&sel)
        .filter_map(|opt| opt.value().attr("value"))
        .filter_map(|v| v.trim().parse().ok())
        .collect();
    hours.sort_unstable();
    hours.dedup();
    Ok(hours)
}

/// Plans in the plan list. A plan without a name element uses its whole text.
pub fn parse_plans(document: &Html, selectors: &SelectorConfig) -> Result<Vec<PlanPrice>> {
    let item_sel = parse_selector(&selectors.plan_item)?;
    let name_sel = parse_selector(&selectors.plan_name)?;
    let price_sel = parse_selector(&selectors.plan_price)?;

    let plans = document
        .select(&item_sel)
        .map(|item| {
            let name = item
                .select(&name_sel)
                .next()
                .map(element_text)
                .unwrap_or_else(|| element_text(item));
            let price = item
                .select(&price_sel)
                .next()
                .map(|p| parse_price(&element_text(p)))
                .unwrap_or(0);
            PlanPrice { name, price }
        })
        .filter(|plan| !plan.name.is_empty())
        .collect();
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PAGE: &str = r#"
        <html><body>
          <p class="css-4mpmt5"> 渋谷スタジオ A </p>
          <select aria-label="開始時">
            <option value="8" disabled>8</option>
            <option value="10">10</option>
            <option value="9">9</option>
            <option value="24">24</option>
          </select>
          <ul class="css-n9qrp8">
            <li><span class="css-k6zetj">通常プラン</span><span class="css-1sq1blk">¥3,300</span></li>
            <li><span class="css-k6zetj">撮影プラン</span><span class="css-d362cm">¥5,500 / 時間</span></li>
            <li>パーティープラン</li>
          </ul>
        </body></html>
    "#;

    struct FixtureFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| crate::error::AppError::scrape(url, "no fixture"))
        }
    }

    #[test]
    fn test_parse_listing() {
        let document = Html::parse_document(PAGE);
        let selectors = SelectorConfig::default();
        assert_eq!(parse_space_name(&document, &selectors).unwrap(), "渋谷スタジオ A");
        assert_eq!(
            parse_start_hours(&document, &selectors).unwrap(),
            vec![9, 10, 24]
        );
    }

    #[test]
    fn test_parse_plans() {
        let document = Html::parse_document(PAGE);
        let plans = parse_plans(&document, &SelectorConfig::default()).unwrap();
        assert_eq!(
            plans,
            vec![
                PlanPrice {
                    name: "通常プラン".into(),
                    price: 3300
                },
                PlanPrice {
                    name: "撮影プラン".into(),
                    price: 5500
                },
                PlanPrice {
                    name: "パーティープラン".into(),
                    price: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_html_source_builds_query_urls() {
        let url = "https://www.spacemarket.com/spaces/x/rooms/r1/reservations/new";
        let day_url = format!("{url}?date=2025-06-01&start_hour=&end_hour=");
        let hour_url = format!("{url}?date=2025-06-01&start_hour=9&end_hour=10");
        let fetcher = Arc::new(FixtureFetcher {
            pages: HashMap::from([(day_url.clone(), PAGE.to_string()), (hour_url.clone(), PAGE.to_string())]),
            requested: Mutex::new(Vec::new()),
        });
        let source = HtmlRateSource::new(fetcher.clone(), &Config::default());
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let listing = source.day_listing(url, date).await.unwrap();
        assert_eq!(listing.start_hours, vec![9, 10, 24]);
        let plans = source.plans(url, date, 9).await.unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(*fetcher.requested.lock().unwrap(), vec![day_url, hour_url]);
    }
}
