//! Service layer for the marketplace scrapers.
//!
//! This module contains the page parsing logic for:
//! - Hourly plan prices (`HtmlRateSource`)
//! - Venue details (`parse_space_details`)
//! - Add-on options and their price changes (`parse_options`)
//! - The 15-minute reservation grid (`collapse_reserved`)
//!
//! Parsers are pure functions over a parsed document. Fetching goes through
//! [`PageFetcher`](crate::utils::http::PageFetcher).

mod options;
mod rates;
mod reservations;
mod space_info;

pub use options::{OptionPage, detect_price_changes, parse_options};
pub use rates::{
    DayListing, HtmlRateSource, PlanPrice, RateSource, parse_plans, parse_space_name,
    parse_start_hours,
};
pub use reservations::{
    ScannedPlan, collapse_reserved, date_label, parse_reserved_flags, parse_scan_plans,
};
pub use space_info::{SpaceDetails, parse_space_details};

use scraper::{ElementRef, Selector};

use crate::error::{AppError, Result};

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Whitespace-normalized text content of an element.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    crate::utils::normalize_whitespace(&element.text().collect::<String>())
}
