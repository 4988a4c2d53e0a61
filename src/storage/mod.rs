//! Storage abstractions for record persistence.
//!
//! Every table is addressed by a partition key and an optional sort key:
//!
//! ```text
//! SpaceRate           spaceId / rate_key      "2025-06-01T09:00#plan_1a2b3c4d"
//! CompetitorSales     spaceId / sortKey       "plan_1a2b3c4d#..."
//! SpaceInfo           spaceId / date          "2025-06-01"
//! OptionInfo          spaceId
//! OptionPriceHistory  spaceId / history_key   "<timestamp>#<optionName>"
//! ```
//!
//! Items travel as JSON objects so both backends share one shape.

pub mod batch;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod local;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::TableConfig;

// Re-export for convenience
pub use batch::{BatchFetch, batch_get_all};
pub use local::LocalStore;

/// A stored item.
pub type Item = Map<String, Value>;

/// Most keys a single batch-get call accepts.
pub const BATCH_GET_LIMIT: usize = 100;

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub partition: String,
    pub sort: Option<String>,
}

impl ItemKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }

    pub fn partition_only(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }
}

/// Table name plus key schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>, partition_key: &str, sort_key: Option<&str>) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.to_string(),
            sort_key: sort_key.map(str::to_string),
        }
    }

    pub fn rates(tables: &TableConfig) -> Self {
        Self::new(&tables.rate, "spaceId", Some("rate_key"))
    }

    pub fn sales(tables: &TableConfig) -> Self {
        Self::new(&tables.sales, "spaceId", Some("sortKey"))
    }

    pub fn space_info(tables: &TableConfig) -> Self {
        Self::new(&tables.space_info, "spaceId", Some("date"))
    }

    pub fn option_info(tables: &TableConfig) -> Self {
        Self::new(&tables.option_info, "spaceId", None)
    }

    pub fn option_history(tables: &TableConfig) -> Self {
        Self::new(&tables.option_history, "spaceId", Some("history_key"))
    }

    /// Extract the primary key of an item, if it carries one.
    pub fn key_of(&self, item: &Item) -> Option<ItemKey> {
        let partition = item.get(&self.partition_key)?.as_str()?.to_string();
        let sort = match &self.sort_key {
            Some(name) => Some(item.get(name)?.as_str()?.to_string()),
            None => None,
        };
        Some(ItemKey { partition, sort })
    }
}

/// A range query over one partition.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub partition: String,
    /// Only return items whose sort key starts with this prefix
    pub sort_prefix: Option<String>,
    /// Attributes to return; all when `None`
    pub projection: Option<Vec<String>>,
    /// Resume after this key (pagination token)
    pub start_after: Option<ItemKey>,
}

impl Query {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sort_prefix = Some(prefix.into());
        self
    }

    pub fn with_projection(mut self, attrs: &[&str]) -> Self {
        self.projection = Some(attrs.iter().map(|a| a.to_string()).collect());
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Set when more pages follow
    pub last_evaluated: Option<ItemKey>,
}

/// Result of one batch-get call.
#[derive(Debug, Clone, Default)]
pub struct BatchGetOutput {
    pub items: Vec<Item>,
    /// Keys the store did not get to; resubmit them
    pub unprocessed: Vec<ItemKey>,
}

/// Trait for record store backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Point read by primary key.
    async fn get(&self, table: &Table, key: &ItemKey) -> Result<Option<Item>>;

    /// Read one page of a partition range query.
    async fn query_page(&self, table: &Table, query: &Query) -> Result<QueryPage>;

    /// Read up to [`BATCH_GET_LIMIT`] keys in one call.
    async fn batch_get(&self, table: &Table, keys: &[ItemKey]) -> Result<BatchGetOutput>;

    /// Create or overwrite an item.
    async fn put(&self, table: &Table, item: Item) -> Result<()>;
}

/// Serialize a record into a store item.
pub fn to_item<T: Serialize>(record: &T) -> Result<Item> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::validation(format!(
            "record serialized to {other} instead of an object"
        ))),
    }
}

/// Run a query to exhaustion, following pagination tokens.
pub async fn query_all(store: &dyn RecordStore, table: &Table, query: Query) -> Result<Vec<Item>> {
    let mut query = query;
    let mut items = Vec::new();
    loop {
        let page = store.query_page(table, &query).await?;
        items.extend(page.items);
        match page.last_evaluated {
            Some(key) => query.start_after = Some(key),
            None => break,
        }
    }
    Ok(items)
}
