use super::events::EventRecorder;
use super::timed_store::TimedStore;
use crate::domain::event::{EventType, PaymentEvent};
use crate::domain::money::{Amount, Currency};
use crate::domain::payment::{IDEMPOTENCY_KEY_FIELD, Payment, PaymentStatus};
use crate::domain::ports::{Condition, PAYMENTS_TABLE, Record};
use crate::error::{PaymentError, Result, StoreError};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Input to [`PaymentLedger::create_payment`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatePayment {
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Owns the payment lifecycle: creation (idempotent by key), lookup, and status
/// transitions. No other component writes to the payments table.
#[derive(Clone)]
pub struct PaymentLedger {
    store: TimedStore,
    events: EventRecorder,
}

impl PaymentLedger {
    pub fn new(store: TimedStore) -> Self {
        Self {
            events: EventRecorder::new(store.clone()),
            store,
        }
    }

    pub fn events(&self) -> &EventRecorder {
        &self.events
    }

    /// Creates a `Pending` payment.
    ///
    /// When `idempotency_key` is set, an existing payment carrying the same key is
    /// returned unchanged instead. The id of a keyed payment is derived from the
    /// key, so two concurrent creations race on the same conditional put and only
    /// one record can ever be written.
    pub async fn create_payment(&self, request: CreatePayment) -> Result<Payment> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(PaymentError::ValidationError(
                "user_id is required".to_string(),
            ));
        }
        let amount = Amount::new(request.amount)?;
        let currency = Currency::new(&request.currency)?;
        let idempotency_key = request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        if let Some(key) = idempotency_key
            && let Some(existing) = self.find_by_idempotency_key(key).await?
        {
            tracing::info!(
                payment_id = %existing.id,
                idempotency_key = key,
                "returning existing payment for idempotency key"
            );
            return Ok(existing);
        }

        let id = match idempotency_key {
            Some(key) => Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let correlation_id = request
            .correlation_id
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        // The idempotency field is owned by the ledger, never by the caller.
        let mut metadata = request.metadata;
        metadata.remove(IDEMPOTENCY_KEY_FIELD);
        if let Some(key) = idempotency_key {
            metadata.insert(IDEMPOTENCY_KEY_FIELD.to_string(), key.to_string());
        }

        let now = Utc::now();
        let payment = Payment {
            id,
            user_id: user_id.to_string(),
            amount,
            currency,
            status: PaymentStatus::Pending,
            external_id: None,
            correlation_id,
            metadata,
            refund_reason: None,
            created_at: now,
            updated_at: now,
        };

        match self
            .store
            .put(
                PAYMENTS_TABLE,
                &payment.id,
                &payment,
                Some(Condition::NotExists),
            )
            .await
        {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                // Lost the race to a concurrent creation with the same key.
                return self.get_payment(&payment.id).await;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            amount = %payment.amount,
            correlation_id = %payment.correlation_id,
            "payment created"
        );
        self.events
            .record(
                PaymentEvent::new(
                    EventType::Created,
                    &payment.id,
                    &payment.user_id,
                    payment.amount.value(),
                    payment.status.as_str(),
                )
                .with_correlation_id(&payment.correlation_id)
                .with_meta("currency", payment.currency.as_str()),
            )
            .await;

        Ok(payment)
    }

    pub async fn get_payment(&self, id: &str) -> Result<Payment> {
        self.store
            .get(PAYMENTS_TABLE, id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Payment {}", id)))
    }

    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>> {
        let attr = format!("metadata.{}", IDEMPOTENCY_KEY_FIELD);
        let mut matches: Vec<Payment> = self
            .store
            .scan(PAYMENTS_TABLE, &attr, &Value::from(key))
            .await?;
        matches.sort_by_key(|p| p.created_at);
        Ok(matches.into_iter().next())
    }

    /// Moves a payment to `status`, attaching `external_ref` when given.
    ///
    /// The write only lands if the status is still the one the transition was
    /// validated against; a concurrent writer that got there first turns this
    /// call into `InvalidState`. Transitions outside the lifecycle graph fail
    /// with `InvalidState` too.
    pub async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        external_ref: Option<&str>,
    ) -> Result<Payment> {
        let mut changes = Record::new();
        if let Some(external_ref) = external_ref {
            changes.insert("external_id".into(), Value::from(external_ref));
        }
        self.transition(id, status, changes).await
    }

    /// Marks a completed payment refunded and stores the reason.
    pub async fn mark_refunded(&self, id: &str, reason: &str) -> Result<Payment> {
        let mut changes = Record::new();
        changes.insert("refund_reason".into(), Value::from(reason));
        self.transition(id, PaymentStatus::Refunded, changes).await
    }

    /// Claims a `Pending` payment for checkout by moving it to `Processing`.
    ///
    /// Exactly one caller wins the claim. Everyone else gets `InvalidState`
    /// before any money moves.
    pub async fn claim_for_processing(&self, id: &str) -> Result<Payment> {
        let current = self.get_payment(id).await?;
        if current.status != PaymentStatus::Pending {
            return Err(PaymentError::InvalidState(format!(
                "payment {} is {}, only PENDING payments can be processed",
                id, current.status
            )));
        }
        self.write_status(current, PaymentStatus::Processing, Record::new())
            .await
    }

    /// Hands a claimed payment back to `Pending`.
    ///
    /// Only a claim that never reached the gateway (no external reference) can
    /// be released.
    pub async fn release_claim(&self, id: &str) -> Result<Payment> {
        let current = self.get_payment(id).await?;
        if current.status != PaymentStatus::Processing || current.external_id.is_some() {
            return Err(PaymentError::InvalidState(format!(
                "payment {} is {} and cannot be released",
                id, current.status
            )));
        }
        self.write_status(current, PaymentStatus::Pending, Record::new())
            .await
    }

    async fn transition(
        &self,
        id: &str,
        status: PaymentStatus,
        changes: Record,
    ) -> Result<Payment> {
        let current = self.get_payment(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(PaymentError::InvalidState(format!(
                "payment {} cannot move from {} to {}",
                id, current.status, status
            )));
        }
        self.write_status(current, status, changes).await
    }

    /// Writes `status` guarded on the status `current` was read with.
    async fn write_status(
        &self,
        current: Payment,
        status: PaymentStatus,
        mut changes: Record,
    ) -> Result<Payment> {
        let id = current.id.clone();
        let expected = Condition::AttributeEquals(
            "status".into(),
            Value::from(current.status.as_str()),
        );

        let now = Utc::now();
        changes.insert("status".into(), Value::from(status.as_str()));
        changes.insert("updated_at".into(), Value::from(now.to_rfc3339()));

        let mut updated = current;
        updated.status = status;
        updated.updated_at = now;
        if let Some(Value::String(external_ref)) = changes.get("external_id") {
            updated.external_id = Some(external_ref.clone());
        }
        if let Some(Value::String(reason)) = changes.get("refund_reason") {
            updated.refund_reason = Some(reason.clone());
        }

        match self
            .store
            .update(PAYMENTS_TABLE, &id, changes, Some(expected))
            .await
        {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                let now_stored = self.get_payment(&id).await?;
                tracing::warn!(
                    payment_id = %id,
                    wanted = %status,
                    found = %now_stored.status,
                    "payment status changed concurrently"
                );
                return Err(PaymentError::InvalidState(format!(
                    "payment {} changed concurrently, now {}",
                    id, now_stored.status
                )));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            payment_id = %id,
            status = %status,
            external_id = updated.external_id.as_deref().unwrap_or(""),
            "payment status updated"
        );
        Ok(updated)
    }
}
