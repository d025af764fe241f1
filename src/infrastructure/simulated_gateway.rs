use crate::domain::money::Amount;
use crate::domain::payment::Payment;
use crate::domain::ports::{GatewayResponse, GatewayStatus, PaymentGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Outcome of a single simulated gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approve,
    Pending,
    Decline,
    /// The gateway answers with a non-2xx status.
    Fail,
}

/// How the simulated gateway answers `process_payment` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayBehavior {
    #[default]
    AlwaysApprove,
    AlwaysDecline,
    AlwaysFail,
    AlwaysPending,
}

impl GatewayBehavior {
    fn outcome(self) -> Outcome {
        match self {
            GatewayBehavior::AlwaysApprove => Outcome::Approve,
            GatewayBehavior::AlwaysDecline => Outcome::Decline,
            GatewayBehavior::AlwaysFail => Outcome::Fail,
            GatewayBehavior::AlwaysPending => Outcome::Pending,
        }
    }
}

#[derive(Default)]
struct Ledger {
    issued: HashMap<String, GatewayStatus>,
    script: VecDeque<Outcome>,
}

/// In-process stand-in for the external payment processor.
///
/// Scripted outcomes are consumed first, one per call (any of the three
/// operations); once the script is empty the configured behaviour applies. An
/// amount of exactly 999.99 always fails, mirroring the hook the sandbox gateway
/// offers for exercising the circuit breaker.
#[derive(Clone, Default)]
pub struct SimulatedGateway {
    behavior: GatewayBehavior,
    latency: Option<Duration>,
    state: Arc<Mutex<Ledger>>,
    calls: Arc<AtomicUsize>,
}

impl SimulatedGateway {
    pub fn new(behavior: GatewayBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue outcomes to be returned before falling back to the behaviour.
    pub async fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.state.lock().await.script.extend(outcomes);
    }

    /// Settle a pending reference, as the real processor does asynchronously.
    pub async fn settle(&self, external_ref: &str, status: GatewayStatus) {
        self.state
            .lock()
            .await
            .issued
            .insert(external_ref.to_string(), status);
    }

    /// Number of calls that reached the gateway.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Option<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.state.lock().await.script.pop_front()
    }
}

fn response(external_ref: &str, status: GatewayStatus, message: &str) -> GatewayResponse {
    GatewayResponse {
        external_ref: external_ref.to_string(),
        status,
        message: message.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    }
}

fn simulated_failure() -> GatewayError {
    GatewayError::Rejected {
        status: 500,
        message: "Simulated gateway error".to_string(),
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn process_payment(&self, payment: &Payment) -> Result<GatewayResponse, GatewayError> {
        let scripted = self.enter().await;
        if payment.amount.value() == dec!(999.99) {
            return Err(simulated_failure());
        }

        let (status, message) = match scripted.unwrap_or(self.behavior.outcome()) {
            Outcome::Approve => (GatewayStatus::Approved, "Payment processed successfully"),
            Outcome::Pending => (GatewayStatus::Pending, "Payment is being processed"),
            Outcome::Decline => (GatewayStatus::Declined, "Payment declined by issuer"),
            Outcome::Fail => return Err(simulated_failure()),
        };

        let external_ref = format!("ext_{}_{}", payment.id, chrono::Utc::now().timestamp());
        self.state
            .lock()
            .await
            .issued
            .insert(external_ref.clone(), status);
        Ok(response(&external_ref, status, message))
    }

    async fn get_status(&self, external_ref: &str) -> Result<GatewayResponse, GatewayError> {
        if let Some(Outcome::Fail) = self.enter().await {
            return Err(simulated_failure());
        }
        let state = self.state.lock().await;
        match state.issued.get(external_ref) {
            Some(status) => Ok(response(external_ref, *status, "Payment status retrieved")),
            None => Err(GatewayError::Rejected {
                status: 404,
                message: format!("Payment {} not found", external_ref),
            }),
        }
    }

    async fn refund(
        &self,
        external_ref: &str,
        _amount: Amount,
    ) -> Result<GatewayResponse, GatewayError> {
        if let Some(Outcome::Fail) = self.enter().await {
            return Err(simulated_failure());
        }
        let state = self.state.lock().await;
        match state.issued.get(external_ref) {
            Some(GatewayStatus::Approved) => Ok(response(
                external_ref,
                GatewayStatus::Approved,
                "Refund processed successfully",
            )),
            Some(_) => Err(GatewayError::Rejected {
                status: 400,
                message: "Only approved payments can be refunded".to_string(),
            }),
            None => Err(GatewayError::Rejected {
                status: 404,
                message: format!("Payment {} not found", external_ref),
            }),
        }
    }
}
