use super::money::{Amount, Currency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key under which the caller's idempotency token is persisted.
pub const IDEMPOTENCY_KEY_FIELD: &str = "idempotency_key";

/// Lifecycle of a payment.
///
/// ```text
/// Pending -> Processing -> Completed -> Refunded
///    |           |
///    +-----------+-------> Failed
/// ```
///
/// `Pending -> Completed` is also legal for gateways that settle synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    /// Whether a payment currently in `self` may move to `next`.
    ///
    /// Re-applying the current status of a non-terminal payment is allowed so the
    /// external reference can be attached without a state change.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (Pending, Pending | Processing | Completed | Failed) => true,
            (Processing, Processing | Completed | Failed) => true,
            (Completed, Refunded) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub amount: Amount,
    pub currency: Currency,
    pub status: PaymentStatus,
    /// Reference assigned by the external gateway once it has seen the payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub correlation_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn idempotency_key(&self) -> Option<&str> {
        self.metadata.get(IDEMPOTENCY_KEY_FIELD).map(String::as_str)
    }
}
