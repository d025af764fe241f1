use crate::domain::ports::{
    Condition, DurableStore, EVENTS_TABLE, PAYMENTS_TABLE, Record, WALLET_TRANSACTIONS_TABLE,
    WALLETS_TABLE, attribute, condition_holds,
};
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Every table the ledgers write to gets its own column family.
pub const TABLES: [&str; 4] = [
    PAYMENTS_TABLE,
    WALLETS_TABLE,
    WALLET_TRANSACTIONS_TABLE,
    EVENTS_TABLE,
];

/// A persistent store implementation using RocksDB.
///
/// Records are stored as JSON under their key inside the table's column family.
/// RocksDB has no native compare-and-set, so every write goes through a single
/// async mutex: the condition is checked and the write applied while it is held.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>` and lock).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = TABLES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, table: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db.cf_handle(table).ok_or_else(|| {
            StoreError::Backend(Box::new(std::io::Error::other(format!(
                "Column family {} not found",
                table
            ))))
        })
    }

    fn read(&self, table: &str, key: &str) -> Result<Option<Record>, StoreError> {
        let cf = self.cf(table)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, table: &str, key: &str, record: &Record) -> Result<(), StoreError> {
        let cf = self.cf(table)?;
        let value = serde_json::to_vec(record)?;
        self.db.put_cf(cf, key.as_bytes(), value)?;
        Ok(())
    }

    fn all(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let cf = self.cf(table)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl DurableStore for RocksDBStore {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Record>, StoreError> {
        self.read(table, key)
    }

    async fn put(
        &self,
        table: &str,
        key: &str,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(condition) = condition
            && !condition_holds(&condition, self.read(table, key)?.as_ref())
        {
            return Err(StoreError::ConditionFailed);
        }
        self.write(table, key, &record)
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: Record,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read(table, key)?;
        if let Some(condition) = condition
            && !condition_holds(&condition, current.as_ref())
        {
            return Err(StoreError::ConditionFailed);
        }
        let mut row = current.unwrap_or_default();
        for (field, value) in changes {
            row.insert(field, value);
        }
        self.write(table, key, &row)
    }

    async fn scan_by_attribute(
        &self,
        table: &str,
        attr: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .all(table)?
            .into_iter()
            .filter(|record| attribute(record, attr) == Some(value))
            .collect())
    }

    async fn list(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        self.all(table)
    }
}
