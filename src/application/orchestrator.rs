use super::payment_ledger::{CreatePayment, PaymentLedger};
use super::payment_processor::PaymentProcessor;
use super::refund_saga::{RefundResult, RefundSaga, RefundStatus};
use super::retry::{DEFAULT_CONFLICT_ATTEMPTS, retry_on_conflict};
use super::timed_store::TimedStore;
use super::wallet_ledger::WalletLedger;
use crate::config::Config;
use crate::domain::money::Balance;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{DurableStoreRef, PaymentGatewayBox};
use crate::domain::wallet::{Wallet, WalletTransaction};
use crate::error::Result;
use crate::resilience::{CircuitBreaker, CircuitSnapshot, ProtectedGateway};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the breaker guarding the payment gateway.
pub const GATEWAY_SERVICE: &str = "payment-gateway";

/// One request, resolved once at the edge into a typed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    CreatePayment(CreatePayment),
    GetPayment {
        payment_id: String,
    },
    UpdateStatus {
        payment_id: String,
        status: PaymentStatus,
        #[serde(default)]
        external_id: Option<String>,
    },
    ProcessPayment {
        payment_id: String,
    },
    SyncStatus {
        payment_id: String,
    },
    Debit {
        user_id: String,
        amount: Decimal,
        payment_id: String,
    },
    Credit {
        user_id: String,
        amount: Decimal,
        payment_id: String,
    },
    GetBalance {
        user_id: String,
    },
    Refund {
        payment_id: String,
        amount: Decimal,
        reason: String,
    },
    FullRefund {
        payment_id: String,
    },
    RefundStatus {
        payment_id: String,
    },
    CircuitState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Payment(Payment),
    Transaction(WalletTransaction),
    Wallet(Wallet),
    Refund(RefundResult),
    RefundStatus(RefundStatus),
    Circuit(CircuitSnapshot),
}

/// Wires the ledgers, the saga and the protected gateway together and
/// dispatches requests to them.
pub struct Orchestrator {
    payments: PaymentLedger,
    wallets: WalletLedger,
    refunds: RefundSaga,
    processor: PaymentProcessor,
    gateway: Arc<ProtectedGateway>,
}

impl Orchestrator {
    pub fn new(store: DurableStoreRef, gateway: PaymentGatewayBox, config: &Config) -> Self {
        let store = TimedStore::new(store, config.store_timeout);
        let payments = PaymentLedger::new(store.clone());
        let wallets = WalletLedger::new(
            store,
            Balance::new(config.wallet_initial_balance),
            config.wallet_currency.clone(),
        );
        let breaker = Arc::new(CircuitBreaker::new(GATEWAY_SERVICE, config.breaker));
        let gateway = Arc::new(ProtectedGateway::new(gateway, breaker, config.gateway_timeout));

        Self {
            refunds: RefundSaga::new(payments.clone(), wallets.clone()),
            processor: PaymentProcessor::new(payments.clone(), wallets.clone(), gateway.clone()),
            payments,
            wallets,
            gateway,
        }
    }

    pub fn payments(&self) -> &PaymentLedger {
        &self.payments
    }

    pub fn wallets(&self) -> &WalletLedger {
        &self.wallets
    }

    pub fn refunds(&self) -> &RefundSaga {
        &self.refunds
    }

    pub fn processor(&self) -> &PaymentProcessor {
        &self.processor
    }

    pub fn circuit_state(&self) -> CircuitSnapshot {
        self.gateway.state()
    }

    pub async fn handle(&self, request: Request) -> Result<Response> {
        match request {
            Request::CreatePayment(create) => self
                .payments
                .create_payment(create)
                .await
                .map(Response::Payment),
            Request::GetPayment { payment_id } => self
                .payments
                .get_payment(&payment_id)
                .await
                .map(Response::Payment),
            Request::UpdateStatus {
                payment_id,
                status,
                external_id,
            } => self
                .payments
                .update_status(&payment_id, status, external_id.as_deref())
                .await
                .map(Response::Payment),
            Request::ProcessPayment { payment_id } => {
                retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || {
                    self.processor.process_payment(&payment_id)
                })
                .await
                .map(Response::Payment)
            }
            Request::SyncStatus { payment_id } => self
                .processor
                .sync_status(&payment_id)
                .await
                .map(Response::Payment),
            Request::Debit {
                user_id,
                amount,
                payment_id,
            } => retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || {
                self.wallets.debit(&user_id, amount, &payment_id)
            })
            .await
            .map(Response::Transaction),
            Request::Credit {
                user_id,
                amount,
                payment_id,
            } => retry_on_conflict(DEFAULT_CONFLICT_ATTEMPTS, || {
                self.wallets.credit(&user_id, amount, &payment_id)
            })
            .await
            .map(Response::Transaction),
            Request::GetBalance { user_id } => self
                .wallets
                .get_balance(&user_id)
                .await
                .map(Response::Wallet),
            Request::Refund {
                payment_id,
                amount,
                reason,
            } => self
                .refunds
                .process_refund(&payment_id, amount, &reason)
                .await
                .map(Response::Refund),
            Request::FullRefund { payment_id } => self
                .refunds
                .process_full_refund(&payment_id)
                .await
                .map(Response::Refund),
            Request::RefundStatus { payment_id } => self
                .refunds
                .get_refund_status(&payment_id)
                .await
                .map(Response::RefundStatus),
            Request::CircuitState => Ok(Response::Circuit(self.circuit_state())),
        }
    }
}
