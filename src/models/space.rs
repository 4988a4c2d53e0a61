//! Venue detail and add-on option types.

use serde::{Deserialize, Serialize};

/// Venue details stored once per day by the space info collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceInfoRecord {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    pub date: String,
    pub name: String,
    pub url: String,
    pub location: String,
    pub station: String,
    pub capacity: String,
    pub stay_capacity: String,
    pub floor_space: String,
    pub space_type: String,
    #[serde(rename = "excludedMorning", default)]
    pub excluded_morning: bool,
    #[serde(default = "default_point")]
    pub point: f64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// Store expiry, epoch seconds
    #[serde(rename = "expireAt")]
    pub expire_at: i64,
}

fn default_point() -> f64 {
    1.0
}

/// One add-on option with its raw price label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub name: String,
    pub price: String,
}

/// Current option list of a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionInfoRecord {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub options: Vec<OptionEntry>,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

/// A price change of one option between two scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPriceChange {
    #[serde(rename = "optionName")]
    pub option_name: String,
    #[serde(rename = "oldPrice")]
    pub old_price: String,
    #[serde(rename = "newPrice")]
    pub new_price: String,
}

/// History row written for each detected price change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionHistoryRecord {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    /// `"<timestamp>#<optionName>"`, unique per change
    pub history_key: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub change: OptionPriceChange,
    pub url: String,
}
