//! Venue details from the space page.

use std::collections::HashMap;

use regex::Regex;
use scraper::Html;

use crate::error::Result;
use crate::models::SelectorConfig;
use crate::services::{element_text, parse_selector};

const NOT_AVAILABLE: &str = "N/A";
const UNNAMED: &str = "名称未取得";

/// Venue fields read from the label/value table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceDetails {
    pub name: String,
    pub location: String,
    pub station: String,
    pub capacity: String,
    pub stay_capacity: String,
    pub floor_space: String,
    pub space_type: String,
}

/// Parse the venue page. Missing fields read as `"N/A"`.
pub fn parse_space_details(document: &Html, selectors: &SelectorConfig) -> Result<SpaceDetails> {
    let title_sel = parse_selector(&selectors.venue_title)?;
    let name = document
        .select(&title_sel)
        .next()
        .map(element_text)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNNAMED.to_string());

    let info = label_values(document, selectors)?;
    let field = |label: &str| {
        info.get(label)
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    let capacity_text = info.get("定員人数").map(String::as_str).unwrap_or_default();
    let capacity = first_match(r"(\d+)人収容", capacity_text);
    let stay_capacity = first_match(r"(\d+)人着席可能", capacity_text);
    let floor_space = first_match(r"\d+", capacity_text).map(|n| format!("{n}㎡"));

    Ok(SpaceDetails {
        name,
        location: field("住所"),
        station: field("最寄駅"),
        capacity: capacity.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        stay_capacity: stay_capacity.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        floor_space: floor_space.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        space_type: field("会場タイプ"),
    })
}

/// Map of row label to the text of the row's second cell.
fn label_values(document: &Html, selectors: &SelectorConfig) -> Result<HashMap<String, String>> {
    let row_sel = parse_selector(&selectors.venue_row)?;
    let label_sel = parse_selector(&selectors.venue_label)?;
    let td_sel = parse_selector("td")?;
    let span_sel = parse_selector("span")?;

    let mut info = HashMap::new();
    for row in document.select(&row_sel) {
        let cells: Vec<_> = row.select(&td_sel).collect();
        let label = row
            .select(&label_sel)
            .next()
            .or_else(|| cells.first().and_then(|td| td.select(&span_sel).next()));
        let Some(label) = label else {
            continue;
        };
        let value = cells.get(1).map(|td| element_text(*td)).unwrap_or_default();
        info.insert(element_text(label), value);
    }
    Ok(info)
}

fn first_match(pattern: &str, text: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .find(text)
        .map(|m| m.as_str().to_string())
}
