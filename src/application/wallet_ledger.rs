use super::events::EventRecorder;
use super::timed_store::TimedStore;
use crate::domain::event::{EventType, PaymentEvent};
use crate::domain::money::{Amount, Balance, Currency};
use crate::domain::ports::{Condition, Record, WALLET_TRANSACTIONS_TABLE, WALLETS_TABLE};
use crate::domain::wallet::{TransactionType, Wallet, WalletTransaction};
use crate::error::{PaymentError, Result, StoreError};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use uuid::Uuid;

/// Balance a wallet starts with when it is created on first access.
pub const DEFAULT_INITIAL_BALANCE: Decimal = dec!(1000);
pub const DEFAULT_CURRENCY: &str = "USD";

/// Owns wallet balances.
///
/// Every mutation is a read-check-write guarded by the wallet's `version`: the
/// write only lands if the stored version still equals the one that was read,
/// and it bumps the version by one. A lost race surfaces as
/// `ConcurrencyConflict`; retrying is the caller's job.
#[derive(Clone)]
pub struct WalletLedger {
    store: TimedStore,
    events: EventRecorder,
    initial_balance: Balance,
    currency: Currency,
}

impl WalletLedger {
    pub fn new(store: TimedStore, initial_balance: Balance, currency: Currency) -> Self {
        Self {
            events: EventRecorder::new(store.clone()),
            store,
            initial_balance,
            currency,
        }
    }

    pub async fn get_or_create_wallet(&self, user_id: &str) -> Result<Wallet> {
        let user_id = require_user(user_id)?;
        if let Some(wallet) = self.store.get(WALLETS_TABLE, user_id).await? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(user_id, self.initial_balance, self.currency.clone());
        match self.create(&wallet).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %user_id,
                    balance = %wallet.balance,
                    "wallet created"
                );
                Ok(wallet)
            }
            Err(PaymentError::AlreadyExists(_)) => {
                tracing::debug!(user_id = %user_id, "wallet created concurrently");
                self.store
                    .get(WALLETS_TABLE, user_id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(format!("Wallet {}", user_id)))
            }
            Err(e) => Err(e),
        }
    }

    async fn create(&self, wallet: &Wallet) -> Result<()> {
        match self
            .store
            .put(
                WALLETS_TABLE,
                &wallet.user_id,
                wallet,
                Some(Condition::NotExists),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionFailed) => Err(PaymentError::AlreadyExists(format!(
                "Wallet {}",
                wallet.user_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_balance(&self, user_id: &str) -> Result<Wallet> {
        self.get_or_create_wallet(user_id).await
    }

    pub async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        payment_id: &str,
    ) -> Result<WalletTransaction> {
        let (amount, payment_id) = validate(user_id, amount, payment_id)?;
        let wallet = self.get_or_create_wallet(user_id).await?;
        self.apply(&wallet, TransactionType::Debit, amount, payment_id)
            .await
    }

    pub async fn credit(
        &self,
        user_id: &str,
        amount: Decimal,
        payment_id: &str,
    ) -> Result<WalletTransaction> {
        let (amount, payment_id) = validate(user_id, amount, payment_id)?;
        let wallet = self.get_or_create_wallet(user_id).await?;
        self.apply(&wallet, TransactionType::Credit, amount, payment_id)
            .await
    }

    /// Applies a mutation against a wallet snapshot read earlier.
    ///
    /// Fails with `ConcurrencyConflict` if the stored wallet has moved past
    /// `snapshot.version` in the meantime.
    pub async fn apply_to_snapshot(
        &self,
        snapshot: &Wallet,
        r#type: TransactionType,
        amount: Decimal,
        payment_id: &str,
    ) -> Result<WalletTransaction> {
        let (amount, payment_id) = validate(&snapshot.user_id, amount, payment_id)?;
        self.apply(snapshot, r#type, amount, payment_id).await
    }

    async fn apply(
        &self,
        wallet: &Wallet,
        r#type: TransactionType,
        amount: Amount,
        payment_id: &str,
    ) -> Result<WalletTransaction> {
        let balance_after = match r#type {
            TransactionType::Debit => wallet.balance_after_debit(amount).inspect_err(|_| {
                tracing::warn!(
                    user_id = %wallet.user_id,
                    payment_id,
                    balance = %wallet.balance,
                    amount = %amount,
                    "insufficient funds"
                )
            })?,
            TransactionType::Credit => wallet.balance_after_credit(amount),
        };

        let now = Utc::now();
        let mut changes = Record::new();
        changes.insert(
            "balance".into(),
            Value::from(balance_after.value().to_string()),
        );
        changes.insert("version".into(), Value::from(wallet.version + 1));
        changes.insert("updated_at".into(), Value::from(now.to_rfc3339()));

        let guard = Condition::AttributeEquals("version".into(), Value::from(wallet.version));
        match self
            .store
            .update(WALLETS_TABLE, &wallet.user_id, changes, Some(guard))
            .await
        {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                tracing::warn!(
                    user_id = %wallet.user_id,
                    payment_id,
                    version = wallet.version,
                    "concurrent wallet update detected"
                );
                return Err(PaymentError::ConcurrencyConflict(wallet.user_id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let transaction = WalletTransaction {
            id: Uuid::new_v4().to_string(),
            user_id: wallet.user_id.clone(),
            payment_id: payment_id.to_string(),
            r#type,
            amount,
            balance_before: wallet.balance,
            balance_after,
            timestamp: now,
        };
        tracing::info!(
            user_id = %wallet.user_id,
            payment_id,
            kind = ?r#type,
            amount = %amount,
            balance = %balance_after,
            version = wallet.version + 1,
            "wallet updated"
        );

        // The balance has already moved; a failed audit write must not undo that.
        if let Err(e) = self
            .store
            .put(
                WALLET_TRANSACTIONS_TABLE,
                &transaction.id,
                &transaction,
                Some(Condition::NotExists),
            )
            .await
        {
            tracing::error!(
                transaction_id = %transaction.id,
                user_id = %wallet.user_id,
                error = %e,
                "failed to record wallet transaction"
            );
        }

        let event_type = match r#type {
            TransactionType::Debit => EventType::WalletDebited,
            TransactionType::Credit => EventType::WalletCredited,
        };
        self.events
            .record(
                PaymentEvent::new(
                    event_type,
                    payment_id,
                    &wallet.user_id,
                    amount.value(),
                    "COMPLETED",
                )
                .with_meta("transaction_id", transaction.id.as_str())
                .with_meta("balance_after", balance_after.value().to_string()),
            )
            .await;

        Ok(transaction)
    }

    pub async fn transactions(&self, user_id: &str) -> Result<Vec<WalletTransaction>> {
        let mut transactions: Vec<WalletTransaction> = self
            .store
            .scan(WALLET_TRANSACTIONS_TABLE, "user_id", &Value::from(user_id))
            .await?;
        transactions.sort_by_key(|t| t.timestamp);
        Ok(transactions)
    }

    /// Every wallet in the store, ordered by user id.
    pub async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let mut wallets: Vec<Wallet> = self.store.list(WALLETS_TABLE).await?;
        wallets.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(wallets)
    }
}

fn require_user(user_id: &str) -> Result<&str> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(PaymentError::ValidationError(
            "user_id is required".to_string(),
        ));
    }
    Ok(user_id)
}

fn validate<'a>(user_id: &str, amount: Decimal, payment_id: &'a str) -> Result<(Amount, &'a str)> {
    require_user(user_id)?;
    let amount = Amount::new(amount)?;
    let payment_id = payment_id.trim();
    if payment_id.is_empty() {
        return Err(PaymentError::ValidationError(
            "payment_id is required".to_string(),
        ));
    }
    Ok((amount, payment_id))
}
