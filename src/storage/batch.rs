//! Chunked batch reads with resubmission of unprocessed keys.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::storage::{BATCH_GET_LIMIT, Item, ItemKey, RecordStore, Table};

/// Outcome of [`batch_get_all`].
#[derive(Debug, Default)]
pub struct BatchFetch {
    pub items: Vec<Item>,
    /// Keys never read: failed calls or unprocessed after the last retry
    pub abandoned: Vec<ItemKey>,
}

/// Read every key, `chunk_size` keys per call.
///
/// Keys reported as unprocessed are resubmitted, at most `max_retries` times
/// per chunk. A failed call abandons the keys it carried; abandoned keys are
/// returned rather than raised, callers treat them as absent.
pub async fn batch_get_all(
    store: &dyn RecordStore,
    table: &Table,
    keys: &[ItemKey],
    chunk_size: usize,
    max_retries: usize,
) -> BatchFetch {
    let chunk_size = chunk_size.clamp(1, BATCH_GET_LIMIT);
    let mut fetch = BatchFetch::default();

    for chunk in keys.chunks(chunk_size) {
        let mut pending: Vec<ItemKey> = chunk.to_vec();
        let mut attempt = 0;

        while !pending.is_empty() {
            match store.batch_get(table, &pending).await {
                Ok(output) => {
                    fetch.items.extend(output.items);
                    pending = dedupe(output.unprocessed);
                }
                Err(e) => {
                    warn!(
                        "batch_get on {} failed for {} keys: {}",
                        table.name,
                        pending.len(),
                        e
                    );
                    fetch.abandoned.append(&mut pending);
                    break;
                }
            }

            if pending.is_empty() {
                break;
            }
            if attempt >= max_retries {
                warn!(
                    "{} keys still unprocessed on {} after {} retries",
                    pending.len(),
                    table.name,
                    max_retries
                );
                fetch.abandoned.append(&mut pending);
                break;
            }
            attempt += 1;
            debug!(
                "Resubmitting {} unprocessed keys (retry {})",
                pending.len(),
                attempt
            );
        }
    }

    fetch
}

fn dedupe(keys: Vec<ItemKey>) -> Vec<ItemKey> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableConfig;
    use crate::storage::LocalStore;
    use serde_json::json;

    fn seeded(count: usize) -> (LocalStore, Table, Vec<ItemKey>) {
        let store = LocalStore::in_memory();
        let table = Table::rates(&TableConfig::default());
        let mut keys = Vec::new();
        for i in 0..count {
            let sort = format!("2025-06-01T00:00#plan_{i:04}");
            store.insert(
                &table,
                json!({"spaceId": "room1", "rate_key": sort, "price": i})
                    .as_object()
                    .unwrap()
                    .clone(),
            );
            keys.push(ItemKey::new("room1", sort));
        }
        (store, table, keys)
    }

    #[tokio::test]
    async fn test_chunks_respect_limit() {
        let (store, table, keys) = seeded(250);
        let fetch = batch_get_all(&store, &table, &keys, 100, 3).await;

        assert_eq!(fetch.items.len(), 250);
        assert!(fetch.abandoned.is_empty());
        assert_eq!(store.stats().batch_calls, 3);
        assert_eq!(store.stats().largest_batch, 100);
    }

    #[tokio::test]
    async fn test_unprocessed_keys_are_resubmitted() {
        let (store, table, keys) = seeded(10);
        store.defer_batches(2);

        let fetch = batch_get_all(&store, &table, &keys, 100, 5).await;
        assert_eq!(fetch.items.len(), 10);
        assert!(fetch.abandoned.is_empty());
        assert_eq!(store.stats().batch_calls, 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_abandons_keys() {
        let (store, table, keys) = seeded(4);
        store.stick_key(keys[2].clone());

        let fetch = batch_get_all(&store, &table, &keys, 100, 2).await;
        assert_eq!(fetch.items.len(), 3);
        assert_eq!(fetch.abandoned, vec![keys[2].clone()]);
        // first call + two resubmissions
        assert_eq!(store.stats().batch_calls, 3);
    }

    #[tokio::test]
    async fn test_failed_call_abandons_chunk_only() {
        let (store, table, keys) = seeded(6);
        store.fail_key(keys[4].clone());

        let fetch = batch_get_all(&store, &table, &keys, 3, 2).await;
        assert_eq!(fetch.items.len(), 3);
        assert_eq!(fetch.abandoned.len(), 3);
        assert!(fetch.abandoned.contains(&keys[4]));
    }
}
