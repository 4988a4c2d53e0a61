//! Application configuration structures.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::storage::BATCH_GET_LIMIT;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Table names in the record store
    #[serde(default)]
    pub tables: TableConfig,

    /// HTTP and scraping behavior settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// CSS selectors for the marketplace pages
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Collector windows and retention
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Rate aggregation and report settings
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Calendar used for weekday/weekend classification
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::validation("scraper.timeout_secs must be > 0"));
        }
        if self.scraper.max_concurrent == 0 {
            return Err(AppError::validation("scraper.max_concurrent must be > 0"));
        }
        if self.aggregation.batch_size == 0 || self.aggregation.batch_size > BATCH_GET_LIMIT {
            return Err(AppError::validation(format!(
                "aggregation.batch_size must be within 1..={BATCH_GET_LIMIT}"
            )));
        }
        if self.aggregation.max_range_days == Some(0) {
            return Err(AppError::validation(
                "aggregation.max_range_days must be > 0",
            ));
        }
        if self.collector.scan_days == 0 {
            return Err(AppError::validation("collector.scan_days must be > 0"));
        }
        let tables = [
            &self.tables.rate,
            &self.tables.sales,
            &self.tables.space_info,
            &self.tables.option_info,
            &self.tables.option_history,
        ];
        if tables.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::validation("table names must not be empty"));
        }
        Ok(())
    }

    /// Apply overrides from process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, keys: &[&str]| {
            if let Some(value) = keys.iter().find_map(|k| lookup(k)) {
                if !value.trim().is_empty() {
                    *target = value;
                }
            }
        };

        set(&mut self.tables.rate, &["RATE_TABLE", "TABLE_NAME"]);
        set(&mut self.tables.sales, &["SALES_TABLE"]);
        set(&mut self.tables.space_info, &["SPACE_INFO_TABLE"]);
        set(&mut self.tables.option_info, &["OPTION_INFO_TABLE"]);
        set(&mut self.tables.option_history, &["OPTION_HISTORY_TABLE"]);

        if let Some(strategy) = lookup("AGGREGATION_STRATEGY") {
            match strategy.parse() {
                Ok(s) => self.aggregation.strategy = s,
                Err(e) => tracing::warn!("Ignoring AGGREGATION_STRATEGY: {}", e),
            }
        }
        if let Some(secs) = lookup("CRAWL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.scraper.timeout_secs = secs;
        }
        if let Some(n) = lookup("MAX_CONCURRENT").and_then(|v| v.parse().ok()) {
            self.scraper.max_concurrent = n;
        }
        if let Some(ms) = lookup("REQUEST_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.scraper.request_delay_ms = ms;
        }
    }
}

/// Record store table names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "defaults::rate_table")]
    pub rate: String,
    #[serde(default = "defaults::sales_table")]
    pub sales: String,
    #[serde(default = "defaults::space_info_table")]
    pub space_info: String,
    #[serde(default = "defaults::option_info_table")]
    pub option_info: String,
    #[serde(default = "defaults::option_history_table")]
    pub option_history: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            rate: defaults::rate_table(),
            sales: defaults::sales_table(),
            space_info: defaults::space_info_table(),
            option_info: defaults::option_info_table(),
            option_history: defaults::option_history_table(),
        }
    }
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent page requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Query appended to a reservation URL to select a date and a one-hour range.
    ///
    /// Placeholders: `{date}`, `{start_hour}`, `{end_hour}`.
    #[serde(default = "defaults::rate_query")]
    pub rate_query: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            rate_query: defaults::rate_query(),
        }
    }
}

/// CSS selectors for each scraped page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Space name on the reservation page
    #[serde(default = "defaults::space_name")]
    pub space_name: String,
    /// Enabled options of the start-hour dropdown
    #[serde(default = "defaults::start_hour_options")]
    pub start_hour_options: String,
    /// One plan entry in the plan list
    #[serde(default = "defaults::plan_item")]
    pub plan_item: String,
    /// Plan name inside a plan entry
    #[serde(default = "defaults::plan_name")]
    pub plan_name: String,
    /// Plan price inside a plan entry
    #[serde(default = "defaults::plan_price")]
    pub plan_price: String,
    /// Plan entries on the reservation scan page
    #[serde(default = "defaults::scan_plan_item")]
    pub scan_plan_item: String,
    /// 15-minute availability cells of the reservation grid
    #[serde(default = "defaults::time_slot")]
    pub time_slot: String,
    /// Venue title on the space detail page
    #[serde(default = "defaults::venue_title")]
    pub venue_title: String,
    /// Label/value rows on the space detail page
    #[serde(default = "defaults::venue_row")]
    pub venue_row: String,
    /// Label span inside a venue row
    #[serde(default = "defaults::venue_label")]
    pub venue_label: String,
    /// Heading that marks the options section
    #[serde(default = "defaults::option_section")]
    pub option_section: String,
    /// Option entries below the options heading
    #[serde(default = "defaults::option_item")]
    pub option_item: String,
    /// Option name inside an option entry
    #[serde(default = "defaults::option_name")]
    pub option_name: String,
    /// Option price inside an option entry
    #[serde(default = "defaults::option_price")]
    pub option_price: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            space_name: defaults::space_name(),
            start_hour_options: defaults::start_hour_options(),
            plan_item: defaults::plan_item(),
            plan_name: defaults::plan_name(),
            plan_price: defaults::plan_price(),
            scan_plan_item: defaults::scan_plan_item(),
            time_slot: defaults::time_slot(),
            venue_title: defaults::venue_title(),
            venue_row: defaults::venue_row(),
            venue_label: defaults::venue_label(),
            option_section: defaults::option_section(),
            option_item: defaults::option_item(),
            option_name: defaults::option_name(),
            option_price: defaults::option_price(),
        }
    }
}

/// Collector windows and retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Days scanned by the rate collector when a job does not say otherwise
    #[serde(default = "defaults::scan_days")]
    pub scan_days: u32,

    /// Days of space info rows written per scrape
    #[serde(default = "defaults::space_info_days")]
    pub space_info_days: u32,

    /// Days a space info row lives before store expiry
    #[serde(default = "defaults::space_info_ttl_days")]
    pub space_info_ttl_days: u32,

    /// Days covered by a reservation scan
    #[serde(default = "defaults::reservation_days")]
    pub reservation_days: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            scan_days: defaults::scan_days(),
            space_info_days: defaults::space_info_days(),
            space_info_ttl_days: defaults::space_info_ttl_days(),
            reservation_days: defaults::reservation_days(),
        }
    }
}

/// Price resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One point read per candidate key
    Sequential,
    /// Bulk read of the whole candidate universe
    #[default]
    Batched,
}

impl std::str::FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "batched" => Ok(Self::Batched),
            other => Err(AppError::config(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Rate aggregation and report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub strategy: Strategy,

    /// Keys per batch-get call
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Resubmissions of unprocessed keys before giving up on them
    #[serde(default = "defaults::max_unprocessed_retries")]
    pub max_unprocessed_retries: usize,

    /// Longest accepted date range of a rate query, in days; unlimited when unset
    #[serde(default)]
    pub max_range_days: Option<u32>,

    /// Days after today covered by the sales report
    #[serde(default = "defaults::sales_window_days")]
    pub sales_window_days: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            batch_size: defaults::batch_size(),
            max_unprocessed_retries: defaults::max_unprocessed_retries(),
            max_range_days: None,
            sales_window_days: defaults::sales_window_days(),
        }
    }
}

/// Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalendarConfig {
    /// Public holidays classified as weekend days
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

mod defaults {
    // Table defaults
    pub fn rate_table() -> String {
        "SpaceRate".into()
    }
    pub fn sales_table() -> String {
        "CompetitorSales".into()
    }
    pub fn space_info_table() -> String {
        "SpaceInfo".into()
    }
    pub fn option_info_table() -> String {
        "OptionInfo".into()
    }
    pub fn option_history_table() -> String {
        "OptionPriceHistory".into()
    }

    // Scraper defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        90
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn max_concurrent() -> usize {
        2
    }
    pub fn rate_query() -> String {
        "date={date}&start_hour={start_hour}&end_hour={end_hour}".into()
    }

    // Selector defaults
    pub fn space_name() -> String {
        "p.css-4mpmt5".into()
    }
    pub fn start_hour_options() -> String {
        r#"select[aria-label="開始時"] option:not([disabled])"#.into()
    }
    pub fn plan_item() -> String {
        "ul.css-n9qrp8 > li".into()
    }
    pub fn plan_name() -> String {
        "span.css-k6zetj".into()
    }
    pub fn plan_price() -> String {
        "span.css-1sq1blk, span.css-d362cm, span.css-1y4ezd0".into()
    }
    pub fn scan_plan_item() -> String {
        "li.css-1vwbwmt, li.css-1cpdoqx".into()
    }
    pub fn time_slot() -> String {
        "div.css-1i0gn25".into()
    }
    pub fn venue_title() -> String {
        "h1.css-cftpp3, h1".into()
    }
    pub fn venue_row() -> String {
        "tr".into()
    }
    pub fn venue_label() -> String {
        "span.css-ygxe26".into()
    }
    pub fn option_section() -> String {
        "h2#room-options".into()
    }
    pub fn option_item() -> String {
        "li.css-zzxv54".into()
    }
    pub fn option_name() -> String {
        "p.css-l8u2g2".into()
    }
    pub fn option_price() -> String {
        "p.css-0".into()
    }

    // Collector defaults
    pub fn scan_days() -> u32 {
        7
    }
    pub fn space_info_days() -> u32 {
        7
    }
    pub fn space_info_ttl_days() -> u32 {
        7
    }
    pub fn reservation_days() -> u32 {
        14
    }

    // Aggregation defaults
    pub fn batch_size() -> usize {
        100
    }
    pub fn max_unprocessed_retries() -> usize {
        5
    }
    pub fn sales_window_days() -> u32 {
        14
    }
}
