//! In-process record store with optional JSON persistence.
//!
//! Used by the CLI for offline runs and by tests. When opened on a directory,
//! each table lives in one file:
//!
//! ```text
//! {root}/
//! ├── SpaceRate.json        # array of items
//! ├── CompetitorSales.json
//! └── ...
//! ```
//!
//! Tests can inject faults (failing keys, keys that stay unprocessed) to
//! exercise the degradation paths of callers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::storage::{
    BATCH_GET_LIMIT, BatchGetOutput, Item, ItemKey, Query, QueryPage, RecordStore, Table,
};

/// Call counters, for asserting read patterns in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub get_calls: usize,
    pub query_calls: usize,
    pub batch_calls: usize,
    pub put_calls: usize,
    pub largest_batch: usize,
}

#[derive(Default)]
struct Faults {
    fail_all: bool,
    failing: HashSet<ItemKey>,
    stuck: HashSet<ItemKey>,
    deferred_batches: usize,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, BTreeMap<ItemKey, Item>>,
    loaded: HashSet<String>,
    faults: Faults,
    stats: StoreStats,
}

/// Record store kept in memory, optionally mirrored to a directory.
pub struct LocalStore {
    root_dir: Option<PathBuf>,
    page_size: usize,
    state: Mutex<State>,
}

impl LocalStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            root_dir: None,
            page_size: 1000,
            state: Mutex::new(State::default()),
        }
    }

    /// A store persisted under `root_dir`, one JSON file per table.
    pub fn open(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: Some(root_dir.into()),
            ..Self::in_memory()
        }
    }

    /// Limit the number of items per query page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert an item directly, bypassing persistence and faults.
    ///
    /// Returns false when the item lacks the table's key attributes.
    pub fn insert(&self, table: &Table, item: Item) -> bool {
        let Some(key) = table.key_of(&item) else {
            return false;
        };
        let mut state = self.state();
        state.loaded.insert(table.name.clone());
        state
            .tables
            .entry(table.name.clone())
            .or_default()
            .insert(key, item);
        true
    }

    /// Number of items stored in a table.
    pub fn len(&self, table: &Table) -> usize {
        self.state()
            .tables
            .get(&table.name)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, table: &Table) -> bool {
        self.len(table) == 0
    }

    /// Every item of a table, in key order.
    pub fn items(&self, table: &Table) -> Vec<Item> {
        self.state()
            .tables
            .get(&table.name)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StoreStats {
        self.state().stats.clone()
    }

    /// Make every call fail.
    pub fn fail_all(&self, fail: bool) {
        self.state().faults.fail_all = fail;
    }

    /// Make any read touching `key` fail.
    pub fn fail_key(&self, key: ItemKey) {
        self.state().faults.failing.insert(key);
    }

    /// Report `key` as unprocessed on every batch read.
    pub fn stick_key(&self, key: ItemKey) {
        self.state().faults.stuck.insert(key);
    }

    /// Report all keys as unprocessed for the next `calls` batch reads.
    pub fn defer_batches(&self, calls: usize) {
        self.state().faults.deferred_batches = calls;
    }

    fn table_path(root: &Path, table: &Table) -> PathBuf {
        root.join(format!("{}.json", table.name))
    }

    /// Load a table file on first access.
    async fn ensure_loaded(&self, table: &Table) -> Result<()> {
        let Some(root) = &self.root_dir else {
            return Ok(());
        };
        if self.state().loaded.contains(&table.name) {
            return Ok(());
        }

        let path = Self::table_path(root, table);
        let items: Vec<Item> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(AppError::Io(e)),
        };
        debug!("Loaded {} items from {}", items.len(), path.display());

        let mut state = self.state();
        if state.loaded.insert(table.name.clone()) {
            let rows = state.tables.entry(table.name.clone()).or_default();
            for item in items {
                if let Some(key) = table.key_of(&item) {
                    rows.entry(key).or_insert(item);
                }
            }
        }
        Ok(())
    }

    /// Write a table file atomically (write to temp, then rename).
    async fn persist(&self, table: &Table) -> Result<()> {
        let Some(root) = &self.root_dir else {
            return Ok(());
        };
        let items = self.items(table);
        let bytes = serde_json::to_vec_pretty(&items)?;

        tokio::fs::create_dir_all(root).await?;
        let path = Self::table_path(root, table);
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn check_fault(state: &State, keys: &[ItemKey]) -> Result<()> {
        if state.faults.fail_all {
            return Err(AppError::store("injected failure"));
        }
        if let Some(key) = keys.iter().find(|k| state.faults.failing.contains(k)) {
            return Err(AppError::store(format!(
                "injected failure for key {}#{}",
                key.partition,
                key.sort.as_deref().unwrap_or_default()
            )));
        }
        Ok(())
    }
}

fn project(item: &Item, projection: Option<&[String]>) -> Item {
    match projection {
        Some(attrs) => item
            .iter()
            .filter(|(k, _)| attrs.iter().any(|a| a == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        None => item.clone(),
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn get(&self, table: &Table, key: &ItemKey) -> Result<Option<Item>> {
        self.ensure_loaded(table).await?;
        let mut state = self.state();
        state.stats.get_calls += 1;
        Self::check_fault(&state, std::slice::from_ref(key))?;
        Ok(state
            .tables
            .get(&table.name)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    async fn query_page(&self, table: &Table, query: &Query) -> Result<QueryPage> {
        self.ensure_loaded(table).await?;
        let mut state = self.state();
        state.stats.query_calls += 1;
        Self::check_fault(&state, &[])?;

        let Some(rows) = state.tables.get(&table.name) else {
            return Ok(QueryPage::default());
        };

        let mut matching = rows
            .iter()
            .filter(|(key, _)| key.partition == query.partition)
            .filter(|(key, _)| match (&query.sort_prefix, &key.sort) {
                (Some(prefix), Some(sort)) => sort.starts_with(prefix.as_str()),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|(key, _)| match &query.start_after {
                Some(after) => *key > after,
                None => true,
            });

        let mut page = QueryPage::default();
        let mut last = None;
        for (key, item) in matching.by_ref().take(self.page_size) {
            page.items.push(project(item, query.projection.as_deref()));
            last = Some(key.clone());
        }
        if matching.next().is_some() {
            page.last_evaluated = last;
        }
        Ok(page)
    }

    async fn batch_get(&self, table: &Table, keys: &[ItemKey]) -> Result<BatchGetOutput> {
        if keys.len() > BATCH_GET_LIMIT {
            return Err(AppError::validation(format!(
                "batch_get accepts at most {} keys, got {}",
                BATCH_GET_LIMIT,
                keys.len()
            )));
        }
        self.ensure_loaded(table).await?;
        let mut state = self.state();
        state.stats.batch_calls += 1;
        state.stats.largest_batch = state.stats.largest_batch.max(keys.len());
        Self::check_fault(&state, keys)?;

        let mut output = BatchGetOutput::default();
        if state.faults.deferred_batches > 0 {
            state.faults.deferred_batches -= 1;
            output.unprocessed = keys.to_vec();
            return Ok(output);
        }

        let rows = state.tables.get(&table.name);
        for key in keys {
            if state.faults.stuck.contains(key) {
                output.unprocessed.push(key.clone());
            } else if let Some(item) = rows.and_then(|r| r.get(key)) {
                output.items.push(item.clone());
            }
        }
        Ok(output)
    }

    async fn put(&self, table: &Table, item: Item) -> Result<()> {
        self.ensure_loaded(table).await?;
        let key = table.key_of(&item).ok_or_else(|| {
            AppError::validation(format!("item is missing the key attributes of {}", table.name))
        })?;
        {
            let mut state = self.state();
            state.stats.put_calls += 1;
            Self::check_fault(&state, &[])?;
            state
                .tables
                .entry(table.name.clone())
                .or_default()
                .insert(key, item);
        }
        self.persist(table).await
    }
}
