use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Created,
    Processed,
    Failed,
    Refunded,
    WalletDebited,
    WalletCredited,
}

/// Append-only audit record. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    pub payment_id: String,
    pub user_id: String,
    pub event_type: EventType,
    pub amount: Decimal,
    /// Status snapshot at the time the event was recorded.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn new(
        event_type: EventType,
        payment_id: &str,
        user_id: &str,
        amount: Decimal,
        status: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payment_id: payment_id.to_string(),
            user_id: user_id.to_string(),
            event_type,
            amount,
            status: status.to_string(),
            correlation_id: None,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: &str) -> Self {
        self.correlation_id = Some(correlation_id.to_string());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_type_vocabulary() {
        let names: Vec<String> = [
            EventType::Created,
            EventType::Processed,
            EventType::Failed,
            EventType::Refunded,
            EventType::WalletDebited,
            EventType::WalletCredited,
        ]
        .iter()
        .map(|t| serde_json::to_string(t).unwrap())
        .collect();
        assert_eq!(
            names,
            vec![
                "\"created\"",
                "\"processed\"",
                "\"failed\"",
                "\"refunded\"",
                "\"wallet-debited\"",
                "\"wallet-credited\""
            ]
        );
    }

    #[test]
    fn test_builder_sets_metadata() {
        let event = PaymentEvent::new(EventType::Refunded, "p1", "u1", dec!(5), "completed")
            .with_correlation_id("c1")
            .with_meta("reason", "customer request");
        assert_eq!(event.correlation_id.as_deref(), Some("c1"));
        assert_eq!(event.metadata["reason"], "customer request");
        assert!(!event.id.is_empty());
    }
}
