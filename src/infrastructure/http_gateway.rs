use crate::domain::money::Amount;
use crate::domain::payment::Payment;
use crate::domain::ports::{GatewayResponse, PaymentGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    payment_id: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    user_id: &'a str,
    correlation_id: &'a str,
    metadata: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundRequest<'a> {
    external_id: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
}

/// Client for the external processor's JSON-over-HTTP API.
#[derive(Clone)]
pub struct HttpGatewayClient {
    config: HttpGatewayConfig,
    http_client: Client,
}

impl HttpGatewayClient {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<GatewayResponse, GatewayError> {
        let response = request
            .header("X-API-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GatewayResponse>(&body)
                .map(|r| r.message)
                .unwrap_or(body);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpGatewayClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn process_payment(&self, payment: &Payment) -> Result<GatewayResponse, GatewayError> {
        let body = ProcessRequest {
            payment_id: &payment.id,
            amount: payment.amount.value(),
            currency: payment.currency.as_str(),
            user_id: &payment.user_id,
            correlation_id: &payment.correlation_id,
            metadata: &payment.metadata,
        };
        self.send(self.http_client.post(self.url("/payment/process")).json(&body))
            .await
    }

    async fn get_status(&self, external_ref: &str) -> Result<GatewayResponse, GatewayError> {
        self.send(
            self.http_client
                .get(self.url("/payment/status"))
                .query(&[("externalId", external_ref)]),
        )
        .await
    }

    async fn refund(
        &self,
        external_ref: &str,
        amount: Amount,
    ) -> Result<GatewayResponse, GatewayError> {
        let body = RefundRequest {
            external_id: external_ref,
            amount: amount.value(),
        };
        self.send(self.http_client.post(self.url("/payment/refund")).json(&body))
            .await
    }
}
