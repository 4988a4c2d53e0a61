//! Per-plan averages over resolved slots.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DayType, Slot};
use crate::pricing::catalog::PlanCatalog;
use crate::pricing::resolver::Resolutions;

/// Average price of one plan across the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanAggregate {
    #[serde(rename = "planDisplayName")]
    pub plan_display_name: String,
    /// `None` when nothing resolved
    pub average_price: Option<f64>,
    pub samples_count: usize,
}

impl PlanAggregate {
    pub fn from_prices(plan_display_name: impl Into<String>, prices: &[u64]) -> Self {
        let average_price = if prices.is_empty() {
            None
        } else {
            let sum: u64 = prices.iter().sum();
            Some(sum as f64 / prices.len() as f64)
        };
        Self {
            plan_display_name: plan_display_name.into(),
            average_price,
            samples_count: prices.len(),
        }
    }
}

/// Response body of the rate aggregation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateReport {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub day_type: DayType,
    pub plans: BTreeMap<String, PlanAggregate>,
}

/// Aggregate every catalog plan over `slots`.
pub fn aggregate(
    catalog: &PlanCatalog,
    slots: &[Slot],
    resolutions: &Resolutions,
) -> BTreeMap<String, PlanAggregate> {
    catalog
        .plan_ids()
        .into_iter()
        .map(|plan_id| {
            let prices: Vec<u64> = slots
                .iter()
                .filter_map(|slot| resolutions.get(&plan_id, *slot))
                .map(|r| r.price)
                .collect();
            let aggregate = PlanAggregate::from_prices(catalog.display_name(&plan_id), &prices);
            (plan_id, aggregate)
        })
        .collect()
}
