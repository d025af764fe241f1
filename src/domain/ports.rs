use super::money::Amount;
use super::payment::Payment;
use crate::error::{GatewayError, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A stored record: a flat-or-nested JSON object.
pub type Record = Map<String, Value>;

pub const PAYMENTS_TABLE: &str = "payments";
pub const WALLETS_TABLE: &str = "wallets";
pub const WALLET_TRANSACTIONS_TABLE: &str = "wallet_transactions";
pub const EVENTS_TABLE: &str = "payment_events";

/// Predicate that must hold against the currently stored record for a
/// conditional write to be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// No record is stored under the key.
    NotExists,
    /// A record is stored under the key.
    Exists,
    /// A record is stored and its attribute (dotted path) equals the value.
    AttributeEquals(String, Value),
}

/// Durable key-value store with conditional writes.
///
/// Adapters must evaluate a condition and apply the write atomically with respect
/// to every other write on the same store; this is what the wallet ledger's
/// optimistic concurrency relies on.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Record>, StoreError>;

    async fn put(
        &self,
        table: &str,
        key: &str,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<(), StoreError>;

    /// Merges the top-level fields of `changes` into the stored record.
    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: Record,
        condition: Option<Condition>,
    ) -> Result<(), StoreError>;

    async fn scan_by_attribute(
        &self,
        table: &str,
        attr: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError>;

    async fn list(&self, table: &str) -> Result<Vec<Record>, StoreError>;
}

pub type DurableStoreRef = Arc<dyn DurableStore>;

/// Resolves a dotted attribute path (`metadata.idempotency_key`) inside a record.
pub fn attribute<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub fn to_record<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(record) => Ok(record),
        other => Err(StoreError::Backend(
            format!("expected a JSON object, got {}", other).into(),
        )),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Whether `condition` holds given the currently stored record (if any).
pub fn condition_holds(condition: &Condition, current: Option<&Record>) -> bool {
    match (condition, current) {
        (Condition::NotExists, current) => current.is_none(),
        (Condition::Exists, current) => current.is_some(),
        (Condition::AttributeEquals(attr, expected), Some(record)) => {
            attribute(record, attr) == Some(expected)
        }
        (Condition::AttributeEquals(..), None) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Approved,
    Pending,
    Declined,
    #[serde(other)]
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    #[serde(rename = "externalId")]
    pub external_ref: String,
    pub status: GatewayStatus,
    #[serde(default)]
    pub message: String,
    /// Unix seconds as reported by the gateway.
    #[serde(default)]
    pub timestamp: i64,
}

/// External payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn process_payment(&self, payment: &Payment) -> Result<GatewayResponse, GatewayError>;

    async fn get_status(&self, external_ref: &str) -> Result<GatewayResponse, GatewayError>;

    async fn refund(
        &self,
        external_ref: &str,
        amount: Amount,
    ) -> Result<GatewayResponse, GatewayError>;
}

pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
