//! Rate aggregation with fallback price lookup.
//!
//! A request flows through four stages:
//!
//! ```text
//! RateQuery → PlanCatalog → TargetGrid → PriceResolver → aggregate → RateReport
//! ```

pub mod aggregate;
pub mod catalog;
pub mod grid;
pub mod query;
pub mod resolver;

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::models::Config;
use crate::storage::{RecordStore, Table};

pub use aggregate::{PlanAggregate, RateReport, aggregate};
pub use catalog::{PlanCatalog, build_catalog};
pub use grid::{GridIter, TargetGrid};
pub use query::RateQuery;
pub use resolver::{
    BatchedResolver, PriceResolver, Resolutions, Resolved, SequentialResolver, Tier,
    candidate_keys, make_resolver,
};

/// Compute per-plan average prices for a validated request.
///
/// Catalog failures propagate; read failures during resolution only lower
/// sample counts.
pub async fn run_rate_report(
    store: Arc<dyn RecordStore>,
    config: &Config,
    query: &RateQuery,
) -> Result<RateReport> {
    let table = Table::rates(&config.tables);
    let catalog = build_catalog(store.as_ref(), &table, &query.space_id).await?;
    let grid = query.grid()?;
    let mut slots = Vec::with_capacity(grid.slot_count());
    slots.extend(grid.iter());

    let resolver = make_resolver(&config.aggregation, store, table);
    let plan_ids = catalog.plan_ids();
    let resolutions = resolver
        .resolve(&query.space_id, &plan_ids, &slots, query.day_type)
        .await;

    info!(
        "Resolved {} of {} slots for {} ({} plans, {:?})",
        resolutions.len(),
        grid.slot_count() * plan_ids.len(),
        query.space_id,
        plan_ids.len(),
        config.aggregation.strategy
    );

    Ok(RateReport {
        space_id: query.space_id.clone(),
        start_date: query.start_date,
        end_date: query.end_date,
        day_type: query.day_type,
        plans: aggregate(&catalog, &slots, &resolutions),
    })
}
