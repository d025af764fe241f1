use super::money::{Amount, Balance, Currency};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's wallet.
///
/// `version` is the optimistic-concurrency token: it starts at 0 and every
/// successful debit or credit increments it by exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    pub balance: Balance,
    pub currency: Currency,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: &str, initial_balance: Balance, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            balance: initial_balance,
            currency,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance after debiting `amount`, refusing to go below zero.
    pub fn balance_after_debit(&self, amount: Amount) -> Result<Balance, PaymentError> {
        if self.balance.covers(amount) {
            Ok(self.balance - amount.into())
        } else {
            Err(PaymentError::InsufficientFunds {
                available: self.balance.value(),
                required: amount.value(),
            })
        }
    }

    pub fn balance_after_credit(&self, amount: Amount) -> Balance {
        self.balance + amount.into()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Debit,
    Credit,
}

/// Audit entry describing a single wallet mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: String,
    pub payment_id: String,
    pub r#type: TransactionType,
    pub amount: Amount,
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub timestamp: DateTime<Utc>,
}
