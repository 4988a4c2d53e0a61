//! Plan catalog of a space.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::storage::{Item, Query, RecordStore, Table, query_all};

/// Distinct plans observed under one space, with their display names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: BTreeMap<String, Option<String>>,
}

impl PlanCatalog {
    /// Record one stored item. The first display name seen for a plan wins.
    pub fn observe(&mut self, item: &Item) {
        let Some(plan_id) = item.get("planId").and_then(Value::as_str) else {
            return;
        };
        let name = item
            .get("planDisplayName")
            .and_then(Value::as_str)
            .map(str::to_string);
        let entry = self.plans.entry(plan_id.to_string()).or_default();
        if entry.is_none() {
            *entry = name;
        }
    }

    /// Plan ids in ascending order.
    pub fn plan_ids(&self) -> Vec<String> {
        self.plans.keys().cloned().collect()
    }

    /// Display name of a plan, empty when never recorded.
    pub fn display_name(&self, plan_id: &str) -> &str {
        self.plans
            .get(plan_id)
            .and_then(|n| n.as_deref())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl<'a> FromIterator<&'a Item> for PlanCatalog {
    fn from_iter<I: IntoIterator<Item = &'a Item>>(iter: I) -> Self {
        let mut catalog = Self::default();
        for item in iter {
            catalog.observe(item);
        }
        catalog
    }
}

/// Collect every plan stored under `space_id`, across all dates.
///
/// Fails if any page of the query fails.
pub async fn build_catalog(
    store: &dyn RecordStore,
    table: &Table,
    space_id: &str,
) -> Result<PlanCatalog> {
    let query =
        Query::partition(space_id).with_projection(&["planId", "planDisplayName", "rate_key"]);
    let items = query_all(store, table, query).await?;
    let catalog: PlanCatalog = items.iter().collect();
    debug!(
        "Catalog for {}: {} plans from {} items",
        space_id,
        catalog.len(),
        items.len()
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableConfig;
    use crate::storage::LocalStore;
    use serde_json::json;

    fn item(value: serde_json::Value) -> Item {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_catalog_across_pages() {
        let store = LocalStore::in_memory().with_page_size(2);
        let table = Table::rates(&TableConfig::default());
        let rows = [
            ("2025-06-01T09:00#plan_b", "plan_b", Some("Premium")),
            ("2025-06-01T09:00#plan_a", "plan_a", None),
            ("2025-06-02T09:00#plan_a", "plan_a", Some("Standard")),
            ("2025-06-03T09:00#plan_a", "plan_a", Some("Renamed")),
            ("2025-06-03T09:00#plan_b", "plan_b", Some("Premium")),
        ];
        for (key, plan, name) in rows {
            let mut row = item(json!({"spaceId": "room1", "rate_key": key, "planId": plan, "price": 1}));
            if let Some(name) = name {
                row.insert("planDisplayName".into(), json!(name));
            }
            store.insert(&table, row);
        }
        store.insert(
            &table,
            item(json!({"spaceId": "room2", "rate_key": "2025-06-01T09:00#plan_z", "planId": "plan_z"})),
        );

        let catalog = build_catalog(&store, &table, "room1").await.unwrap();
        assert_eq!(catalog.plan_ids(), vec!["plan_a", "plan_b"]);
        assert_eq!(catalog.display_name("plan_a"), "Standard");
        assert_eq!(catalog.display_name("plan_b"), "Premium");
        assert_eq!(catalog.display_name("plan_z"), "");
    }

    #[tokio::test]
    async fn test_catalog_query_failure_propagates() {
        let store = LocalStore::in_memory();
        let table = Table::rates(&TableConfig::default());
        store.fail_all(true);
        assert!(build_catalog(&store, &table, "room1").await.is_err());
    }

    #[test]
    fn test_items_without_plan_are_ignored() {
        let rows = [item(json!({"rate_key": "x"}))];
        let catalog: PlanCatalog = rows.iter().collect();
        assert!(catalog.is_empty());
    }
}
