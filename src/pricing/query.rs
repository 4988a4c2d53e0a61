//! Validation of rate aggregation requests.

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::DayType;
use crate::pricing::grid::TargetGrid;

/// A validated rate aggregation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuery {
    pub space_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_hour: u32,
    pub end_hour: u32,
    pub day_type: DayType,
}

impl RateQuery {
    /// Parse and validate a request body.
    ///
    /// Hours may be JSON numbers or numeric strings. When `max_range_days` is
    /// set, longer ranges are rejected.
    pub fn from_json(body: &Value, max_range_days: Option<u32>) -> Result<Self> {
        let space_id = required_str(body, "spaceId")?;
        if space_id.trim().is_empty() {
            return Err(AppError::validation("spaceId must not be empty"));
        }
        let start_date = parse_date(required_str(body, "start_date")?, "start_date")?;
        let end_date = parse_date(required_str(body, "end_date")?, "end_date")?;
        let start_hour = parse_hour(required(body, "start_hour")?, "start_hour")?;
        let end_hour = parse_hour(required(body, "end_hour")?, "end_hour")?;
        let day_type: DayType = required_str(body, "day_type")?.parse()?;

        let query = Self {
            space_id: space_id.to_string(),
            start_date,
            end_date,
            start_hour,
            end_hour,
            day_type,
        };
        // checks date and hour ordering
        query.grid()?;

        if let Some(limit) = max_range_days {
            let days = (end_date - start_date).num_days() + 1;
            if days > i64::from(limit) {
                return Err(AppError::validation(format!(
                    "date range of {days} days exceeds the limit of {limit}"
                )));
            }
        }
        Ok(query)
    }

    pub fn grid(&self) -> Result<TargetGrid> {
        TargetGrid::new(self.start_date, self.end_date, self.start_hour, self.end_hour)
    }
}

fn required<'a>(body: &'a Value, field: &str) -> Result<&'a Value> {
    match body.get(field) {
        Some(Value::Null) | None => Err(AppError::validation(format!(
            "missing required parameter: {field}"
        ))),
        Some(value) => Ok(value),
    }
}

fn required_str<'a>(body: &'a Value, field: &str) -> Result<&'a str> {
    required(body, field)?
        .as_str()
        .ok_or_else(|| AppError::validation(format!("{field} must be a string")))
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        AppError::validation(format!("{field} must be YYYY-MM-DD, got '{value}': {e}"))
    })
}

fn parse_hour(value: &Value, field: &str) -> Result<u32> {
    let hour = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::validation(format!("{field} must be an integer")))?;

    u32::try_from(hour)
        .ok()
        .filter(|h| *h <= 23)
        .ok_or_else(|| AppError::validation(format!("{field} must be within 0-23, got {hour}")))
}
