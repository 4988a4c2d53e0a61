//! Read-side reports over the collected tables.
//!
//! - `run_sales_report`: Competitor sales per plan over the coming two weeks
//! - `space_info_report`: Stored venue details per room
//! - `options_report`: Stored add-on options per space

pub mod options;
pub mod sales;
pub mod space_info;

pub use options::{OptionsReport, SpaceOptions, options_report};
pub use sales::{SalesQuery, SalesResponse, run_sales_report, sales_queries_from_payload};
pub use space_info::{RoomReport, SpaceInfoReport, space_info_report};

use serde_json::Value;

use crate::error::{AppError, Result};

/// A required, non-empty list of ids. Numeric ids are accepted as strings.
pub fn id_list(body: &Value, field: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = body
        .get(field)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if ids.is_empty() {
        return Err(AppError::validation(format!("{field} parameter is required")));
    }
    Ok(ids)
}
