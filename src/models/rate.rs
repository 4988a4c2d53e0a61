//! Rate observation types and the composite sort key.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::storage::Item;

/// Weekday/weekend classification of a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    /// Classify a date. Saturdays, Sundays and listed holidays are weekend days.
    pub fn for_date(date: NaiveDate, holidays: &[NaiveDate]) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            _ if holidays.contains(&date) => Self::Weekend,
            _ => Self::Weekday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekday => "weekday",
            Self::Weekend => "weekend",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weekday" => Ok(Self::Weekday),
            "weekend" => Ok(Self::Weekend),
            other => Err(AppError::validation(format!(
                "day_type must be 'weekday' or 'weekend', got '{other}'"
            ))),
        }
    }
}

/// An hour-aligned point in local (JST) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(NaiveDateTime);

impl Slot {
    const FORMAT: &'static str = "%Y-%m-%dT%H:00";

    /// Create a slot; `None` when `hour` is not a valid hour of day.
    pub fn new(date: NaiveDate, hour: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, 0, 0).map(|t| Self(date.and_time(t)))
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for Slot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
            .map_err(|e| AppError::validation(format!("invalid slot '{s}': {e}")))?;
        Slot::new(parsed.date(), parsed.hour())
            .ok_or_else(|| AppError::validation(format!("invalid slot '{s}'")))
    }
}

/// Composite sort key `"<YYYY-MM-DD>T<HH>:00#<planId>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateKey {
    pub slot: Slot,
    pub plan_id: String,
}

impl RateKey {
    pub fn new(slot: Slot, plan_id: impl Into<String>) -> Self {
        Self {
            slot,
            plan_id: plan_id.into(),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.slot, self.plan_id)
    }
}

impl FromStr for RateKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let (slot, plan_id) = s
            .split_once('#')
            .ok_or_else(|| AppError::validation(format!("rate key without plan: '{s}'")))?;
        Ok(Self::new(slot.parse()?, plan_id))
    }
}

/// One observed price for one plan at one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    pub rate_key: String,
    pub datetime: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "planId")]
    pub plan_id: String,
    #[serde(rename = "planDisplayName")]
    pub plan_display_name: String,
    #[serde(deserialize_with = "de_price")]
    pub price: u64,
    pub day_type: DayType,
    #[serde(default)]
    pub created_at: String,
}

impl RateRecord {
    /// Build a record for one plan observation at one slot.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        space_id: &str,
        space_name: &str,
        url: &str,
        slot: Slot,
        plan_display_name: &str,
        price: u64,
        day_type: DayType,
        created_at: &str,
    ) -> Self {
        let plan_id = plan_id_for(plan_display_name);
        Self {
            space_id: space_id.to_string(),
            rate_key: RateKey::new(slot, plan_id.clone()).to_string(),
            datetime: slot.to_string(),
            name: space_name.to_string(),
            url: url.to_string(),
            plan_id,
            plan_display_name: plan_display_name.to_string(),
            price,
            day_type,
            created_at: created_at.to_string(),
        }
    }

    pub fn into_item(self) -> Result<Item> {
        crate::storage::to_item(&self)
    }
}

/// The parts of a stored rate item the resolver cares about.
///
/// Read leniently: a missing price counts as 0 and fractional prices are
/// truncated to whole yen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedRate {
    pub day_type: Option<DayType>,
    pub price: u64,
}

impl ObservedRate {
    pub fn from_item(item: &Item) -> Self {
        let day_type = item
            .get("day_type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());
        let price = item.get("price").map(price_from_value).unwrap_or(0);
        Self { day_type, price }
    }
}

/// Derive a stable plan id from its display name.
pub fn plan_id_for(display_name: &str) -> String {
    format!("plan_{}", crate::utils::short_hash(display_name))
}

/// Truncate a JSON price value to whole, non-negative yen.
pub fn price_from_value(value: &Value) -> u64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 {
        n.trunc() as u64
    } else {
        0
    }
}

fn de_price<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(price_from_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_day_type_for_date() {
        // 2025-06-06 is a Friday
        assert_eq!(DayType::for_date(date("2025-06-06"), &[]), DayType::Weekday);
        assert_eq!(DayType::for_date(date("2025-06-07"), &[]), DayType::Weekend);
        assert_eq!(DayType::for_date(date("2025-06-08"), &[]), DayType::Weekend);

        let holidays = [date("2025-07-21")];
        assert_eq!(
            DayType::for_date(date("2025-07-21"), &holidays),
            DayType::Weekend
        );
    }

    #[test]
    fn test_slot_format_and_shift() {
        let slot = Slot::new(date("2025-06-01"), 0).unwrap();
        assert_eq!(slot.to_string(), "2025-06-01T00:00");
        assert_eq!(slot.plus_hours(-1).to_string(), "2025-05-31T23:00");
        assert_eq!(slot.plus_days(14).to_string(), "2025-06-15T00:00");
        assert!(Slot::new(date("2025-06-01"), 24).is_none());
    }

    #[test]
    fn test_rate_key_roundtrip() {
        let key: RateKey = "2025-06-01T09:00#plan_abc".parse().unwrap();
        assert_eq!(key.plan_id, "plan_abc");
        assert_eq!(key.slot.hour(), 9);
        assert_eq!(key.to_string(), "2025-06-01T09:00#plan_abc");
        assert!("2025-06-01T09:00".parse::<RateKey>().is_err());
    }

    #[test]
    fn test_price_truncation() {
        assert_eq!(price_from_value(&json!(1500)), 1500);
        assert_eq!(price_from_value(&json!(1500.9)), 1500);
        assert_eq!(price_from_value(&json!("990.5")), 990);
        assert_eq!(price_from_value(&json!(-3)), 0);
        assert_eq!(price_from_value(&json!(null)), 0);
    }

    #[test]
    fn test_observed_rate_from_item() {
        let item = json!({"day_type": "weekend", "price": 2200.0});
        let observed = ObservedRate::from_item(item.as_object().unwrap());
        assert_eq!(observed.day_type, Some(DayType::Weekend));
        assert_eq!(observed.price, 2200);

        let bare = json!({"rate_key": "x"});
        let observed = ObservedRate::from_item(bare.as_object().unwrap());
        assert_eq!(observed.day_type, None);
        assert_eq!(observed.price, 0);
    }

    #[test]
    fn test_record_item_shape() {
        let slot = Slot::new(date("2025-06-07"), 10).unwrap();
        let record = RateRecord::new(
            "room1",
            "Studio A",
            "https://example.com/rooms/room1",
            slot,
            "Standard",
            3000,
            DayType::Weekend,
            "2025-06-01T09:00:00+09:00",
        );
        let item = record.clone().into_item().unwrap();

        assert_eq!(item["spaceId"], "room1");
        assert_eq!(item["planDisplayName"], "Standard");
        assert_eq!(item["day_type"], "weekend");
        assert_eq!(
            item["rate_key"],
            format!("2025-06-07T10:00#{}", record.plan_id)
        );

        let back: RateRecord = serde_json::from_value(Value::Object(item)).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_plan_id_is_stable() {
        assert_eq!(plan_id_for("Standard"), plan_id_for("Standard"));
        assert_ne!(plan_id_for("Standard"), plan_id_for("Premium"));
        assert!(plan_id_for("Standard").starts_with("plan_"));
        assert_eq!(plan_id_for("Standard").len(), "plan_".len() + 8);
    }

    #[test]
    fn test_plan_id_matches_stored_ids() {
        // ids written by earlier collectors: md5(name)[:8]
        assert_eq!(plan_id_for("Standard"), "plan_eb6d8ae6");
    }
}
