use super::payment_ledger::PaymentLedger;
use super::wallet_ledger::WalletLedger;
use crate::domain::event::{EventType, PaymentEvent};
use crate::domain::money::Amount;
use crate::domain::payment::PaymentStatus;
use crate::domain::wallet::WalletTransaction;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FULL_REFUND_REASON: &str = "Full refund";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub payment_id: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub reason: String,
    /// The compensating wallet credit.
    pub transaction: WalletTransaction,
    /// False when the credit landed but marking the payment refunded failed.
    pub status_updated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundStatus {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub refunded: bool,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Reverses a completed payment: credits the wallet, then flags the payment.
///
/// The credit is the commit point. If it fails nothing has changed and the
/// error is returned. If it succeeds the saga never undoes it, even when the
/// status write that follows fails; that mismatch is logged for reconciliation
/// and reported through `RefundResult::status_updated`.
#[derive(Clone)]
pub struct RefundSaga {
    payments: PaymentLedger,
    wallets: WalletLedger,
}

impl RefundSaga {
    pub fn new(payments: PaymentLedger, wallets: WalletLedger) -> Self {
        Self { payments, wallets }
    }

    pub async fn process_refund(
        &self,
        payment_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<RefundResult> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Err(PaymentError::ValidationError(
                "payment_id is required".to_string(),
            ));
        }
        let amount = Amount::new(amount)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PaymentError::ValidationError(
                "refund reason is required".to_string(),
            ));
        }

        let payment = self.payments.get_payment(payment_id).await?;
        match payment.status {
            PaymentStatus::Refunded => {
                return Err(PaymentError::AlreadyRefunded(payment.id));
            }
            PaymentStatus::Completed => {}
            other => {
                return Err(PaymentError::InvalidState(format!(
                    "payment {} is {}, only COMPLETED payments can be refunded",
                    payment.id, other
                )));
            }
        }
        if amount > payment.amount {
            return Err(PaymentError::RefundAmountExceeded {
                requested: amount.value(),
                original: payment.amount.value(),
            });
        }

        let refund_id = Uuid::new_v4().to_string();
        tracing::info!(
            refund_id = %refund_id,
            payment_id = %payment.id,
            user_id = %payment.user_id,
            amount = %amount,
            "processing refund"
        );

        let transaction = self
            .wallets
            .credit(&payment.user_id, amount.value(), &payment.id)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    refund_id = %refund_id,
                    payment_id = %payment.id,
                    error = %e,
                    "refund credit failed, payment left unchanged"
                )
            })?;

        let marked = self.payments.mark_refunded(&payment.id, reason).await;
        let (status, status_updated) = match marked {
            Ok(updated) => (updated.status, true),
            Err(e) => {
                tracing::error!(
                    refund_id = %refund_id,
                    payment_id = %payment.id,
                    transaction_id = %transaction.id,
                    error = %e,
                    "wallet credited but payment status update failed"
                );
                (payment.status, false)
            }
        };

        self.payments
            .events()
            .record(
                PaymentEvent::new(
                    EventType::Refunded,
                    &payment.id,
                    &payment.user_id,
                    amount.value(),
                    status.as_str(),
                )
                .with_correlation_id(&payment.correlation_id)
                .with_meta("refund_id", refund_id.as_str())
                .with_meta("reason", reason)
                .with_meta("transaction_id", transaction.id.as_str()),
            )
            .await;

        Ok(RefundResult {
            refund_id,
            payment_id: payment.id,
            amount: amount.value(),
            status,
            reason: reason.to_string(),
            transaction,
            status_updated,
        })
    }

    /// Refunds the whole payment amount.
    pub async fn process_full_refund(&self, payment_id: &str) -> Result<RefundResult> {
        let payment = self.payments.get_payment(payment_id.trim()).await?;
        self.process_refund(&payment.id, payment.amount.value(), FULL_REFUND_REASON)
            .await
    }

    pub async fn get_refund_status(&self, payment_id: &str) -> Result<RefundStatus> {
        let payment = self.payments.get_payment(payment_id.trim()).await?;
        Ok(RefundStatus {
            refunded: payment.status == PaymentStatus::Refunded,
            status: payment.status,
            amount: payment.amount.value(),
            reason: payment.refund_reason,
            payment_id: payment.id,
        })
    }
}
