use crate::domain::ports::{Condition, DurableStore, Record, attribute, condition_holds};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Tables = HashMap<String, HashMap<String, Record>>;

/// A thread-safe in-memory durable store.
///
/// Uses `Arc<RwLock<..>>` so clones share the same tables. Conditional writes are
/// evaluated and applied under the write lock, which makes them atomic with respect
/// to every other write on the store.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn put(
        &self,
        table: &str,
        key: &str,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(condition) = condition
            && !condition_holds(&condition, rows.get(key))
        {
            return Err(StoreError::ConditionFailed);
        }
        rows.insert(key.to_string(), record);
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: Record,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(condition) = condition
            && !condition_holds(&condition, rows.get(key))
        {
            return Err(StoreError::ConditionFailed);
        }
        let row = rows.entry(key.to_string()).or_default();
        for (field, value) in changes {
            row.insert(field, value);
        }
        Ok(())
    }

    async fn scan_by_attribute(
        &self,
        table: &str,
        attr: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|record| attribute(record, attr) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}
