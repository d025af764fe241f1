use super::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::domain::money::Amount;
use crate::domain::payment::Payment;
use crate::domain::ports::{GatewayResponse, PaymentGateway, PaymentGatewayBox};
use crate::error::GatewayError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Gateway client wrapped in a circuit breaker and a per-call deadline.
///
/// All three operations share the same breaker, so a failing `refund` counts
/// against `process_payment` too.
pub struct ProtectedGateway {
    inner: PaymentGatewayBox,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

impl ProtectedGateway {
    pub fn new(inner: PaymentGatewayBox, breaker: Arc<CircuitBreaker>, timeout: Duration) -> Self {
        Self {
            inner,
            breaker,
            timeout,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn state(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    async fn guarded<F>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<GatewayResponse, GatewayError>
    where
        F: Future<Output = Result<GatewayResponse, GatewayError>>,
    {
        let deadline = self.timeout;
        let result = self
            .breaker
            .call(async move {
                tokio::time::timeout(deadline, call)
                    .await
                    .unwrap_or(Err(GatewayError::Timeout))
            })
            .await;

        if let Err(err) = &result {
            tracing::warn!(
                gateway = self.inner.name(),
                operation,
                error = %err,
                "gateway call failed"
            );
        }
        result
    }
}

#[async_trait]
impl PaymentGateway for ProtectedGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process_payment(&self, payment: &Payment) -> Result<GatewayResponse, GatewayError> {
        self.guarded("process_payment", self.inner.process_payment(payment))
            .await
    }

    async fn get_status(&self, external_ref: &str) -> Result<GatewayResponse, GatewayError> {
        self.guarded("get_status", self.inner.get_status(external_ref))
            .await
    }

    async fn refund(
        &self,
        external_ref: &str,
        amount: Amount,
    ) -> Result<GatewayResponse, GatewayError> {
        self.guarded("refund", self.inner.refund(external_ref, amount))
            .await
    }
}
