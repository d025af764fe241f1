mod common;

use common::{create_request, harness};
use payment_orchestrator::domain::ports::{DurableStore, PAYMENTS_TABLE};
use payment_orchestrator::infrastructure::simulated_gateway::GatewayBehavior;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_same_key_creates_one_payment() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let ledger = h.orchestrator.payments();

    let first = ledger
        .create_payment(create_request("u1", dec!(100), Some("order-1")))
        .await
        .unwrap();
    let second = ledger
        .create_payment(create_request("u1", dec!(100), Some("order-1")))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.list(PAYMENTS_TABLE).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_different_keys_create_distinct_payments() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let ledger = h.orchestrator.payments();

    let a = ledger
        .create_payment(create_request("u1", dec!(10), Some("a")))
        .await
        .unwrap();
    let b = ledger
        .create_payment(create_request("u1", dec!(10), Some("b")))
        .await
        .unwrap();
    let unkeyed = ledger
        .create_payment(create_request("u1", dec!(10), None))
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(a.id, unkeyed.id);
    assert_eq!(h.store.list(PAYMENTS_TABLE).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creations_with_same_key() {
    let h = Arc::new(harness(GatewayBehavior::AlwaysApprove));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move {
                h.orchestrator
                    .payments()
                    .create_payment(create_request("u1", dec!(25), Some("retry-storm")))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut payments = Vec::new();
    for handle in handles {
        payments.push(handle.await.unwrap());
    }

    let first = &payments[0];
    assert!(payments.iter().all(|p| p == first));
    assert_eq!(h.store.list(PAYMENTS_TABLE).await.unwrap().len(), 1);
}
