//! Stored option lists per space.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::models::{Config, OptionEntry};
use crate::storage::{Item, ItemKey, RecordStore, Table};

/// Option list of one space, or why it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SpaceOptions {
    Found {
        #[serde(rename = "spaceId")]
        space_id: String,
        name: Option<String>,
        options: Vec<OptionEntry>,
    },
    Missing {
        #[serde(rename = "spaceId")]
        space_id: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionsReport {
    pub spaces: Vec<SpaceOptions>,
}

/// Look up every space. Per-space read failures are reported inline.
pub async fn options_report(
    store: &dyn RecordStore,
    config: &Config,
    space_ids: &[String],
) -> OptionsReport {
    let table = Table::option_info(&config.tables);
    let mut spaces = Vec::with_capacity(space_ids.len());

    for space_id in space_ids {
        let entry = match store.get(&table, &ItemKey::partition_only(space_id)).await {
            Ok(Some(item)) => SpaceOptions::Found {
                space_id: space_id.clone(),
                name: item.get("name").and_then(Value::as_str).map(str::to_string),
                options: options_of(&item),
            },
            Ok(None) => SpaceOptions::Missing {
                space_id: space_id.clone(),
                error: "Space not found".to_string(),
            },
            Err(e) => {
                warn!("Option lookup for {} failed: {}", space_id, e);
                SpaceOptions::Missing {
                    space_id: space_id.clone(),
                    error: e.to_string(),
                }
            }
        };
        spaces.push(entry);
    }
    OptionsReport { spaces }
}

/// Options of a stored item; missing names or prices read as empty.
fn options_of(item: &Item) -> Vec<OptionEntry> {
    let text = |option: &Value, key: &str| {
        option
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    item.get("options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .map(|o| OptionEntry {
                    name: text(o, "name"),
                    price: text(o, "price"),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_found_missing_and_failed() {
        let store = LocalStore::in_memory();
        let config = Config::default();
        let table = Table::option_info(&config.tables);
        store.insert(
            &table,
            json!({
                "spaceId": "r1",
                "name": "会議室",
                "options": [{"name": "プロジェクター", "price": "1,100円"}, {"name": "椅子"}]
            })
            .as_object()
            .unwrap()
            .clone(),
        );
        store.fail_key(ItemKey::partition_only("r3"));

        let ids = vec!["r1".to_string(), "r2".to_string(), "r3".to_string()];
        let report = options_report(&store, &config, &ids).await;
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["spaces"][0]["name"], "会議室");
        assert_eq!(value["spaces"][0]["options"][1], json!({"name": "椅子", "price": ""}));
        assert_eq!(value["spaces"][1], json!({"spaceId": "r2", "error": "Space not found"}));
        assert!(value["spaces"][2]["error"].as_str().unwrap().contains("injected"));
    }
}
