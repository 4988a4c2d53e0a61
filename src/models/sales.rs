//! Competitor reservation and sales types.

use serde::{Deserialize, Serialize};

use crate::models::rate::price_from_value;

/// One observed reservation, as stored by the sales collector.
///
/// All fields are optional on read; rows missing a date or start time are
/// ignored by the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "spaceId", default)]
    pub space_id: String,
    #[serde(rename = "sortKey", default)]
    pub sort_key: String,
    #[serde(rename = "reservationDate", default)]
    pub reservation_date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default, deserialize_with = "de_price")]
    pub price: u64,
    #[serde(rename = "planDisplayName", default)]
    pub plan_display_name: String,
    #[serde(default)]
    pub processed_at: String,
}

impl SalesRecord {
    /// Plan id encoded as the sort key prefix (`"<planId>#..."`).
    pub fn plan_id(&self) -> Option<&str> {
        self.sort_key.split_once('#').map(|(plan, _)| plan)
    }
}

/// A contiguous block of reserved 15-minute cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedRange {
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: u32,
    pub duration_minutes: u32,
}

fn de_price<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(price_from_value(&value))
}
