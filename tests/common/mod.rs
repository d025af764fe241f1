#![allow(dead_code)]

use payment_orchestrator::application::orchestrator::{Orchestrator, Request, Response};
use payment_orchestrator::application::payment_ledger::CreatePayment;
use payment_orchestrator::config::Config;
use payment_orchestrator::domain::payment::Payment;
use payment_orchestrator::error::PaymentError;
use payment_orchestrator::infrastructure::in_memory::InMemoryStore;
use payment_orchestrator::infrastructure::simulated_gateway::{GatewayBehavior, SimulatedGateway};
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub struct Harness {
    pub store: InMemoryStore,
    pub gateway: SimulatedGateway,
    pub orchestrator: Orchestrator,
}

pub fn harness(behavior: GatewayBehavior) -> Harness {
    harness_with(behavior, Config::default())
}

pub fn harness_with(behavior: GatewayBehavior, config: Config) -> Harness {
    let store = InMemoryStore::new();
    let gateway = SimulatedGateway::new(behavior);
    let orchestrator = Orchestrator::new(
        Arc::new(store.clone()),
        Box::new(gateway.clone()),
        &config,
    );
    Harness {
        store,
        gateway,
        orchestrator,
    }
}

pub fn create_request(user_id: &str, amount: Decimal, key: Option<&str>) -> CreatePayment {
    CreatePayment {
        user_id: user_id.to_string(),
        amount,
        currency: "USD".to_string(),
        idempotency_key: key.map(str::to_string),
        ..Default::default()
    }
}

pub async fn create_payment(h: &Harness, user_id: &str, amount: Decimal) -> Payment {
    h.orchestrator
        .payments()
        .create_payment(create_request(user_id, amount, None))
        .await
        .unwrap()
}

pub fn expect_payment(response: Response) -> Payment {
    match response {
        Response::Payment(payment) => payment,
        other => panic!("expected a payment, got {:?}", other),
    }
}

pub async fn process(h: &Harness, payment_id: &str) -> Result<Payment, PaymentError> {
    h.orchestrator
        .handle(Request::ProcessPayment {
            payment_id: payment_id.to_string(),
        })
        .await
        .map(expect_payment)
}

/// Writes `lines` to a temporary JSON-lines file.
pub fn requests_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}
