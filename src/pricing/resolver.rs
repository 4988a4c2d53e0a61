//! Fallback price resolution.
//!
//! For a target `(plan, slot, day type)` the candidates are probed in a fixed
//! order and the first record with the requested day type wins:
//!
//! 1. the slot itself
//! 2. the same hour at +7, +14, -7 and -14 days, in that order
//! 3. each of the 24 preceding hours, nearest first
//!
//! Tier order beats temporal distance. Read failures count as absent.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{AggregationConfig, DayType, ObservedRate, RateKey, Slot, Strategy};
use crate::storage::{ItemKey, RecordStore, Table, batch_get_all};

/// Weekly analogue offsets in days. The order is part of the contract.
pub const WEEKLY_OFFSETS: [i64; 4] = [7, 14, -7, -14];

/// How far back the intraday recession walks.
pub const MAX_RECESSION_HOURS: i64 = 24;

/// Priority level a price was found at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Direct,
    Weekly,
    Recession,
}

/// A resolved price and the tier it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub price: u64,
    pub tier: Tier,
}

/// Candidate keys for one target, in probe order.
pub fn candidate_keys(
    plan_id: &str,
    target: Slot,
) -> impl Iterator<Item = (Tier, RateKey)> + Clone + '_ {
    let direct = std::iter::once((Tier::Direct, target));
    let weekly = WEEKLY_OFFSETS
        .into_iter()
        .map(move |days| (Tier::Weekly, target.plus_days(days)));
    let recession =
        (1..=MAX_RECESSION_HOURS).map(move |hours| (Tier::Recession, target.plus_hours(-hours)));

    direct
        .chain(weekly)
        .chain(recession)
        .map(move |(tier, slot)| (tier, RateKey::new(slot, plan_id)))
}

/// Walk the candidates of one target against an in-memory lookup.
///
/// `lookup` returns the price of a key whose record already matched the
/// requested day type.
pub fn select(
    plan_id: &str,
    target: Slot,
    mut lookup: impl FnMut(&RateKey) -> Option<u64>,
) -> Option<Resolved> {
    candidate_keys(plan_id, target)
        .find_map(|(tier, key)| lookup(&key).map(|price| Resolved { price, tier }))
}

/// Resolved prices keyed by target `(slot, plan)`. Unresolved targets are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolutions(BTreeMap<RateKey, Resolved>);

impl Resolutions {
    pub fn get(&self, plan_id: &str, slot: Slot) -> Option<&Resolved> {
        self.0.get(&RateKey::new(slot, plan_id))
    }

    pub fn insert(&mut self, plan_id: &str, slot: Slot, resolved: Resolved) {
        self.0.insert(RateKey::new(slot, plan_id), resolved);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolves every `(plan, slot)` pair of a request.
#[async_trait]
pub trait PriceResolver: Send + Sync {
    async fn resolve(
        &self,
        space_id: &str,
        plans: &[String],
        slots: &[Slot],
        day_type: DayType,
    ) -> Resolutions;
}

/// Build the resolver selected by configuration.
pub fn make_resolver(
    config: &AggregationConfig,
    store: Arc<dyn RecordStore>,
    table: Table,
) -> Box<dyn PriceResolver> {
    match config.strategy {
        Strategy::Sequential => Box::new(SequentialResolver::new(store, table)),
        Strategy::Batched => Box::new(BatchedResolver::new(
            store,
            table,
            config.batch_size,
            config.max_unprocessed_retries,
        )),
    }
}

/// One point read per candidate, stopping at the first match.
pub struct SequentialResolver {
    store: Arc<dyn RecordStore>,
    table: Table,
}

impl SequentialResolver {
    pub fn new(store: Arc<dyn RecordStore>, table: Table) -> Self {
        Self { store, table }
    }

    async fn resolve_one(
        &self,
        space_id: &str,
        plan_id: &str,
        target: Slot,
        day_type: DayType,
    ) -> Option<Resolved> {
        for (tier, key) in candidate_keys(plan_id, target) {
            let item_key = ItemKey::new(space_id, key.to_string());
            match self.store.get(&self.table, &item_key).await {
                Ok(Some(item)) => {
                    let observed = ObservedRate::from_item(&item);
                    if observed.day_type == Some(day_type) {
                        return Some(Resolved {
                            price: observed.price,
                            tier,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Read of {} failed, treating as absent: {}", key, e),
            }
        }
        None
    }
}

#[async_trait]
impl PriceResolver for SequentialResolver {
    async fn resolve(
        &self,
        space_id: &str,
        plans: &[String],
        slots: &[Slot],
        day_type: DayType,
    ) -> Resolutions {
        let mut resolutions = Resolutions::default();
        for plan_id in plans {
            for slot in slots {
                if let Some(resolved) = self.resolve_one(space_id, plan_id, *slot, day_type).await {
                    resolutions.insert(plan_id, *slot, resolved);
                }
            }
        }
        resolutions
    }
}

/// Bulk-fetch the whole candidate universe, then select in memory.
///
/// A batch-get call either succeeds or fails as a whole, so one failing key
/// loses every candidate in its chunk, not just itself. The sequential
/// resolver only loses the failing key.
pub struct BatchedResolver {
    store: Arc<dyn RecordStore>,
    table: Table,
    batch_size: usize,
    max_retries: usize,
}

impl BatchedResolver {
    pub fn new(
        store: Arc<dyn RecordStore>,
        table: Table,
        batch_size: usize,
        max_retries: usize,
    ) -> Self {
        Self {
            store,
            table,
            batch_size,
            max_retries,
        }
    }
}

#[async_trait]
impl PriceResolver for BatchedResolver {
    async fn resolve(
        &self,
        space_id: &str,
        plans: &[String],
        slots: &[Slot],
        day_type: DayType,
    ) -> Resolutions {
        let mut universe = BTreeSet::new();
        for plan_id in plans {
            for slot in slots {
                universe.extend(candidate_keys(plan_id, *slot).map(|(_, key)| key));
            }
        }
        let keys: Vec<ItemKey> = universe
            .iter()
            .map(|key| ItemKey::new(space_id, key.to_string()))
            .collect();

        let fetch = batch_get_all(
            self.store.as_ref(),
            &self.table,
            &keys,
            self.batch_size,
            self.max_retries,
        )
        .await;
        if !fetch.abandoned.is_empty() {
            warn!(
                "{} of {} candidate keys for {} could not be read",
                fetch.abandoned.len(),
                keys.len(),
                space_id
            );
        }

        let found: HashMap<String, u64> = fetch
            .items
            .iter()
            .filter_map(|item| {
                let rate_key = item.get("rate_key").and_then(Value::as_str)?;
                let observed = ObservedRate::from_item(item);
                (observed.day_type == Some(day_type)).then(|| (rate_key.to_string(), observed.price))
            })
            .collect();
        debug!(
            "Fetched {} items, {} match {}",
            fetch.items.len(),
            found.len(),
            day_type
        );

        let mut resolutions = Resolutions::default();
        for plan_id in plans {
            for slot in slots {
                let resolved = select(plan_id, *slot, |key| found.get(&key.to_string()).copied());
                if let Some(resolved) = resolved {
                    resolutions.insert(plan_id, *slot, resolved);
                }
            }
        }
        resolutions
    }
}
