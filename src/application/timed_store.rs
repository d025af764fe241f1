use crate::domain::ports::{Condition, DurableStoreRef, Record, from_record, to_record};
use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// A `DurableStore` handle whose every call is bounded by a deadline, with typed
/// helpers for (de)serialising domain records.
#[derive(Clone)]
pub struct TimedStore {
    store: DurableStoreRef,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(store: DurableStoreRef, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        self.bounded(self.store.get(table, key))
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn put<T: Serialize>(
        &self,
        table: &str,
        key: &str,
        value: &T,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let record = to_record(value)?;
        self.bounded(self.store.put(table, key, record, condition))
            .await
    }

    pub async fn update(
        &self,
        table: &str,
        key: &str,
        changes: Record,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        self.bounded(self.store.update(table, key, changes, condition))
            .await
    }

    pub async fn scan<T: DeserializeOwned>(
        &self,
        table: &str,
        attr: &str,
        value: &Value,
    ) -> Result<Vec<T>, StoreError> {
        self.bounded(self.store.scan_by_attribute(table, attr, value))
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub async fn list<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, StoreError> {
        self.bounded(self.store.list(table))
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }
}
