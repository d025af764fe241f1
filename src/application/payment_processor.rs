use super::payment_ledger::PaymentLedger;
use super::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use super::wallet_ledger::WalletLedger;
use crate::domain::event::{EventType, PaymentEvent};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{GatewayResponse, GatewayStatus, PaymentGateway};
use crate::error::{PaymentError, Result};
use crate::resilience::ProtectedGateway;
use std::sync::Arc;

/// Checkout flow: debit the wallet, charge through the gateway, and settle the
/// payment, crediting the wallet back when the charge does not go through.
#[derive(Clone)]
pub struct PaymentProcessor {
    payments: PaymentLedger,
    wallets: WalletLedger,
    gateway: Arc<ProtectedGateway>,
}

impl PaymentProcessor {
    pub fn new(
        payments: PaymentLedger,
        wallets: WalletLedger,
        gateway: Arc<ProtectedGateway>,
    ) -> Self {
        Self {
            payments,
            wallets,
            gateway,
        }
    }

    /// Processes a `Pending` payment.
    ///
    /// The payment is claimed (moved to `Processing`) before the wallet is
    /// touched, so concurrent calls for one payment debit and charge at most
    /// once; the losers get `InvalidState`.
    ///
    /// A decline resolves to `Ok` with the payment `Failed`. A gateway call
    /// failure (including an open circuit) also fails the payment but is
    /// returned as the error. Timeouts and transport errors are treated as "not
    /// charged" and credited back; the gateway never issued a reference for
    /// them, so there is nothing `sync_status` could reconcile against.
    pub async fn process_payment(&self, payment_id: &str) -> Result<Payment> {
        let payment = self.payments.claim_for_processing(payment_id).await?;

        match self
            .wallets
            .debit(&payment.user_id, payment.amount.value(), &payment.id)
            .await
        {
            Ok(_) => {}
            Err(e @ PaymentError::InsufficientFunds { .. }) => {
                self.fail(&payment, &e.to_string()).await?;
                return Err(e);
            }
            Err(e @ PaymentError::ConcurrencyConflict(_)) => {
                // Nothing was debited; let the caller retry from scratch.
                self.release(&payment).await;
                return Err(e);
            }
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    user_id = %payment.user_id,
                    error = %e,
                    "debit outcome unknown, payment left PROCESSING for reconciliation"
                );
                return Err(e);
            }
        }

        match self.gateway.process_payment(&payment).await {
            Ok(response) => self.settle(payment, response).await,
            Err(e) => {
                self.compensate(&payment).await;
                self.fail(&payment, &e.to_string()).await?;
                Err(e.into())
            }
        }
    }

    /// Re-checks a `Processing` payment with the gateway and settles it if the
    /// gateway has reached a verdict. Payments in any other state are returned
    /// unchanged.
    pub async fn sync_status(&self, payment_id: &str) -> Result<Payment> {
        let payment = self.payments.get_payment(payment_id).await?;
        if payment.status != PaymentStatus::Processing {
            return Ok(payment);
        }
        let Some(external_ref) = payment.external_id.clone() else {
            return Err(PaymentError::InvalidState(format!(
                "payment {} has no gateway reference",
                payment.id
            )));
        };

        let response = self.gateway.get_status(&external_ref).await?;
        self.settle(payment, response).await
    }

    async fn settle(&self, payment: Payment, response: GatewayResponse) -> Result<Payment> {
        match response.status {
            GatewayStatus::Approved => {
                let updated = self
                    .payments
                    .update_status(
                        &payment.id,
                        PaymentStatus::Completed,
                        Some(&response.external_ref),
                    )
                    .await?;
                self.payments
                    .events()
                    .record(
                        event(EventType::Processed, &updated)
                            .with_meta("external_id", response.external_ref.as_str())
                            .with_meta("gateway_message", response.message.as_str()),
                    )
                    .await;
                Ok(updated)
            }
            GatewayStatus::Pending
                if payment.external_id.as_deref() == Some(response.external_ref.as_str()) =>
            {
                Ok(payment)
            }
            GatewayStatus::Pending => {
                self.payments
                    .update_status(
                        &payment.id,
                        PaymentStatus::Processing,
                        Some(&response.external_ref),
                    )
                    .await
            }
            GatewayStatus::Declined | GatewayStatus::Error => {
                tracing::warn!(
                    payment_id = %payment.id,
                    gateway_status = ?response.status,
                    message = %response.message,
                    "payment not approved by gateway"
                );
                self.compensate(&payment).await;
                self.fail(&payment, &response.message).await
            }
        }
    }

    async fn release(&self, payment: &Payment) {
        if let Err(e) = self.payments.release_claim(&payment.id).await {
            tracing::error!(
                payment_id = %payment.id,
                error = %e,
                "could not release payment claim"
            );
        }
    }

    /// Credits back the debit taken for `payment`.
    async fn compensate(&self, payment: &Payment) {
        let result = retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || {
            self.wallets
                .credit(&payment.user_id, payment.amount.value(), &payment.id)
        })
        .await;

        if let Err(e) = result {
            tracing::error!(
                payment_id = %payment.id,
                user_id = %payment.user_id,
                amount = %payment.amount,
                error = %e,
                "compensating credit failed, wallet needs reconciliation"
            );
        }
    }

    async fn fail(&self, payment: &Payment, reason: &str) -> Result<Payment> {
        let failed = self
            .payments
            .update_status(&payment.id, PaymentStatus::Failed, None)
            .await?;
        self.payments
            .events()
            .record(event(EventType::Failed, &failed).with_meta("reason", reason))
            .await;
        Ok(failed)
    }
}

fn event(event_type: EventType, payment: &Payment) -> PaymentEvent {
    PaymentEvent::new(
        event_type,
        &payment.id,
        &payment.user_id,
        payment.amount.value(),
        payment.status.as_str(),
    )
    .with_correlation_id(&payment.correlation_id)
}
