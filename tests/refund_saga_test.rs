mod common;

use common::{create_payment, harness, process};
use payment_orchestrator::application::orchestrator::{Request, Response};
use payment_orchestrator::domain::event::EventType;
use payment_orchestrator::domain::money::Balance;
use payment_orchestrator::domain::payment::PaymentStatus;
use payment_orchestrator::error::PaymentError;
use payment_orchestrator::infrastructure::simulated_gateway::GatewayBehavior;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_refund_of_externally_completed_payment() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let payment = create_payment(&h, "user_1", dec!(100)).await;

    let completed = h
        .orchestrator
        .handle(Request::UpdateStatus {
            payment_id: payment.id.clone(),
            status: PaymentStatus::Completed,
            external_id: Some("ext_1".into()),
        })
        .await
        .unwrap();
    let Response::Payment(completed) = completed else {
        panic!("expected payment");
    };
    assert_eq!(completed.external_id.as_deref(), Some("ext_1"));

    let refund = match h
        .orchestrator
        .handle(Request::Refund {
            payment_id: payment.id.clone(),
            amount: dec!(100),
            reason: "customer request".into(),
        })
        .await
        .unwrap()
    {
        Response::Refund(refund) => refund,
        other => panic!("expected refund, got {:?}", other),
    };
    assert_eq!(refund.status, PaymentStatus::Refunded);
    assert!(refund.status_updated);
    assert_eq!(refund.transaction.balance_after, Balance::new(dec!(1100)));

    // No debit ever happened, so the refund credit lands on top of the initial balance.
    let wallet = h.orchestrator.wallets().get_balance("user_1").await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(1100)));

    let stored = h.orchestrator.payments().get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Refunded);
    assert_eq!(stored.refund_reason.as_deref(), Some("customer request"));

    let status = h.orchestrator.refunds().get_refund_status(&payment.id).await.unwrap();
    assert!(status.refunded);
    assert_eq!(status.reason.as_deref(), Some("customer request"));
}

#[tokio::test]
async fn test_second_refund_is_rejected() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let payment = create_payment(&h, "u1", dec!(40)).await;
    process(&h, &payment.id).await.unwrap();

    h.orchestrator
        .refunds()
        .process_full_refund(&payment.id)
        .await
        .unwrap();
    let again = h.orchestrator.refunds().process_full_refund(&payment.id).await;
    assert!(matches!(again, Err(PaymentError::AlreadyRefunded(ref id)) if *id == payment.id));

    // Charged 40, refunded 40 once.
    let wallet = h.orchestrator.wallets().get_balance("u1").await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(1000)));
    assert_eq!(h.orchestrator.wallets().transactions("u1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_pending_payment_cannot_be_refunded() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let payment = create_payment(&h, "u1", dec!(25)).await;

    let result = h
        .orchestrator
        .refunds()
        .process_refund(&payment.id, dec!(25), "changed mind")
        .await;
    assert!(matches!(result, Err(PaymentError::InvalidState(_))));

    let stored = h.orchestrator.payments().get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(h.orchestrator.wallets().transactions("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_refund_cannot_exceed_payment() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let payment = create_payment(&h, "u1", dec!(25)).await;
    process(&h, &payment.id).await.unwrap();

    let result = h
        .orchestrator
        .refunds()
        .process_refund(&payment.id, dec!(25.01), "too much")
        .await;
    let err = result.unwrap_err();
    assert_eq!(err.code(), "REFUND_AMOUNT_EXCEEDED");

    let stored = h.orchestrator.payments().get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_refund_leaves_an_audit_trail() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let payment = create_payment(&h, "u1", dec!(60)).await;
    process(&h, &payment.id).await.unwrap();
    let refund = h
        .orchestrator
        .refunds()
        .process_refund(&payment.id, dec!(60), "duplicate order")
        .await
        .unwrap();

    let history = h
        .orchestrator
        .payments()
        .events()
        .history(&payment.id)
        .await
        .unwrap();
    let kinds: Vec<EventType> = history.iter().map(|e| e.event_type).collect();
    for expected in [
        EventType::Created,
        EventType::WalletDebited,
        EventType::Processed,
        EventType::WalletCredited,
        EventType::Refunded,
    ] {
        assert!(kinds.contains(&expected), "missing {:?} in {:?}", expected, kinds);
    }

    let refunded = history
        .iter()
        .find(|e| e.event_type == EventType::Refunded)
        .unwrap();
    assert_eq!(refunded.status, "REFUNDED");
    assert_eq!(refunded.metadata["refund_id"], refund.refund_id.as_str());
    assert_eq!(refunded.metadata["reason"], "duplicate order");
    assert_eq!(
        refunded.metadata["transaction_id"],
        refund.transaction.id.as_str()
    );
}
