//! DynamoDB record store.
//!
//! Items are converted between JSON values and attribute values; numbers keep
//! their integer form when they have one.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes};
use serde_json::{Number, Value};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::storage::{
    BATCH_GET_LIMIT, BatchGetOutput, Item, ItemKey, Query, QueryPage, RecordStore, Table,
};

/// DynamoDB-backed record store.
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a store from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }

    fn key_attrs(table: &Table, key: &ItemKey) -> Result<HashMap<String, AttributeValue>> {
        let mut attrs = HashMap::new();
        attrs.insert(
            table.partition_key.clone(),
            AttributeValue::S(key.partition.clone()),
        );
        match (&table.sort_key, &key.sort) {
            (Some(name), Some(sort)) => {
                attrs.insert(name.clone(), AttributeValue::S(sort.clone()));
            }
            (None, None) => {}
            _ => {
                return Err(AppError::validation(format!(
                    "key does not match the schema of {}",
                    table.name
                )));
            }
        }
        Ok(attrs)
    }

    fn key_from_attrs(table: &Table, attrs: &HashMap<String, AttributeValue>) -> Option<ItemKey> {
        table.key_of(&to_item(attrs))
    }
}

fn store_err(context: &str, err: impl std::error::Error) -> AppError {
    AppError::store(format!("{context}: {}", DisplayErrorContext(err)))
}

/// Convert a JSON value to an attribute value.
pub fn to_attr(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attr).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attr(v)))
                .collect(),
        ),
    }
}

/// Convert an attribute value to a JSON value. Binary attributes read as null.
pub fn from_attr(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(values.iter().map(from_attr).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_attr(v)))
                .collect(),
        ),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(values.iter().map(|n| number(n)).collect()),
        _ => Value::Null,
    }
}

fn number(n: &str) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::from(i);
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}

fn to_item(attrs: &HashMap<String, AttributeValue>) -> Item {
    attrs
        .iter()
        .map(|(k, v)| (k.clone(), from_attr(v)))
        .collect()
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn get(&self, table: &Table, key: &ItemKey) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&table.name)
            .set_key(Some(Self::key_attrs(table, key)?))
            .send()
            .await
            .map_err(|e| store_err("get_item", e))?;
        Ok(output.item().map(to_item))
    }

    async fn query_page(&self, table: &Table, query: &Query) -> Result<QueryPage> {
        let mut request = self
            .client
            .query()
            .table_name(&table.name)
            .expression_attribute_names("#pk", &table.partition_key)
            .expression_attribute_values(":pk", AttributeValue::S(query.partition.clone()));

        let mut condition = "#pk = :pk".to_string();
        if let (Some(prefix), Some(sort_key)) = (&query.sort_prefix, &table.sort_key) {
            condition.push_str(" AND begins_with(#sk, :prefix)");
            request = request
                .expression_attribute_names("#sk", sort_key)
                .expression_attribute_values(":prefix", AttributeValue::S(prefix.clone()));
        }
        request = request.key_condition_expression(condition);

        if let Some(attrs) = &query.projection {
            let mut placeholders = Vec::with_capacity(attrs.len());
            for (i, attr) in attrs.iter().enumerate() {
                let name = format!("#p{i}");
                request = request.expression_attribute_names(&name, attr);
                placeholders.push(name);
            }
            request = request.projection_expression(placeholders.join(", "));
        }

        if let Some(after) = &query.start_after {
            request = request.set_exclusive_start_key(Some(Self::key_attrs(table, after)?));
        }

        let output = request
            .send()
            .await
            .map_err(|e| store_err("query", e))?;

        let items: Vec<Item> = output.items().iter().map(to_item).collect();
        let last_evaluated = output
            .last_evaluated_key()
            .and_then(|attrs| Self::key_from_attrs(table, attrs));
        debug!(
            "query {} partition={} returned {} items",
            table.name,
            query.partition,
            items.len()
        );

        Ok(QueryPage {
            items,
            last_evaluated,
        })
    }

    async fn batch_get(&self, table: &Table, keys: &[ItemKey]) -> Result<BatchGetOutput> {
        if keys.is_empty() {
            return Ok(BatchGetOutput::default());
        }
        if keys.len() > BATCH_GET_LIMIT {
            return Err(AppError::validation(format!(
                "batch_get accepts at most {} keys, got {}",
                BATCH_GET_LIMIT,
                keys.len()
            )));
        }

        let key_attrs = keys
            .iter()
            .map(|k| Self::key_attrs(table, k))
            .collect::<Result<Vec<_>>>()?;
        let request = KeysAndAttributes::builder()
            .set_keys(Some(key_attrs))
            .build()
            .map_err(|e| store_err("batch_get_item request", e))?;

        let output = self
            .client
            .batch_get_item()
            .request_items(&table.name, request)
            .send()
            .await
            .map_err(|e| store_err("batch_get_item", e))?;

        let items = output
            .responses()
            .and_then(|r| r.get(&table.name))
            .map(|rows| rows.iter().map(to_item).collect())
            .unwrap_or_default();
        let unprocessed = output
            .unprocessed_keys()
            .and_then(|u| u.get(&table.name))
            .map(|k| {
                k.keys()
                    .iter()
                    .filter_map(|attrs| Self::key_from_attrs(table, attrs))
                    .collect()
            })
            .unwrap_or_default();

        Ok(BatchGetOutput { items, unprocessed })
    }

    async fn put(&self, table: &Table, item: Item) -> Result<()> {
        let attrs: HashMap<String, AttributeValue> = item
            .iter()
            .map(|(k, v)| (k.clone(), to_attr(v)))
            .collect();
        self.client
            .put_item()
            .table_name(&table.name)
            .set_item(Some(attrs))
            .send()
            .await
            .map_err(|e| store_err("put_item", e))?;
        Ok(())
    }
}
