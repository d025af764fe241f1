mod common;

use common::harness;
use payment_orchestrator::application::orchestrator::Request;
use payment_orchestrator::application::retry::retry_on_conflict;
use payment_orchestrator::domain::money::Balance;
use payment_orchestrator::domain::wallet::TransactionType;
use payment_orchestrator::error::PaymentError;
use payment_orchestrator::infrastructure::simulated_gateway::GatewayBehavior;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_preserve_balance() {
    let h = Arc::new(harness(GatewayBehavior::AlwaysApprove));
    let mut rng = StdRng::seed_from_u64(42);

    // Credits and small debits only, so no debit can ever hit the floor.
    let ops: Vec<(TransactionType, Decimal)> = (0..60)
        .map(|i| {
            let amount = Decimal::from(rng.gen_range(1u32..=10));
            if i % 2 == 0 {
                (TransactionType::Credit, amount)
            } else {
                (TransactionType::Debit, amount)
            }
        })
        .collect();

    let handles: Vec<_> = ops
        .iter()
        .enumerate()
        .map(|(i, (kind, amount))| {
            let h = h.clone();
            let (kind, amount) = (*kind, *amount);
            tokio::spawn(async move {
                let payment_id = format!("p{}", i);
                let request = match kind {
                    TransactionType::Debit => Request::Debit {
                        user_id: "u1".into(),
                        amount,
                        payment_id,
                    },
                    TransactionType::Credit => Request::Credit {
                        user_id: "u1".into(),
                        amount,
                        payment_id,
                    },
                };
                // The dispatcher retries a handful of times; keep going under heavy contention.
                retry_on_conflict(50, || h.orchestrator.handle(request.clone())).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let expected = ops.iter().fold(dec!(1000), |acc, (kind, amount)| match kind {
        TransactionType::Credit => acc + *amount,
        TransactionType::Debit => acc - *amount,
    });
    let wallet = h.orchestrator.wallets().get_balance("u1").await.unwrap();
    assert_eq!(wallet.balance, Balance::new(expected));
    assert_eq!(wallet.version, ops.len() as u64);

    let transactions = h.orchestrator.wallets().transactions("u1").await.unwrap();
    assert_eq!(transactions.len(), ops.len());
    assert!(transactions.iter().all(|t| t.balance_after >= Balance::ZERO));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let h = Arc::new(harness(GatewayBehavior::AlwaysApprove));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let h = h.clone();
            tokio::spawn(async move {
                let wallets = h.orchestrator.wallets();
                let payment_id = format!("p{}", i);
                retry_on_conflict(100, || wallets.debit("u1", dec!(100), &payment_id)).await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(PaymentError::InsufficientFunds { .. }) => insufficient += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(insufficient, 10);
    let wallet = h.orchestrator.wallets().get_balance("u1").await.unwrap();
    assert_eq!(wallet.balance, Balance::ZERO);
    assert_eq!(wallet.version, 10);
}

#[tokio::test]
async fn test_stale_read_loses_the_race() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let wallets = h.orchestrator.wallets();

    let seen_by_a = wallets.get_or_create_wallet("u1").await.unwrap();
    let seen_by_b = seen_by_a.clone();

    let a = wallets
        .apply_to_snapshot(&seen_by_a, TransactionType::Debit, dec!(30), "pa")
        .await;
    let b = wallets
        .apply_to_snapshot(&seen_by_b, TransactionType::Debit, dec!(30), "pb")
        .await;

    assert!(a.is_ok());
    assert!(matches!(b, Err(PaymentError::ConcurrencyConflict(_))));

    // A fresh read-check-write succeeds.
    wallets.debit("u1", dec!(30), "pb").await.unwrap();
    let wallet = wallets.get_balance("u1").await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(940)));
    assert_eq!(wallet.version, 2);
}

#[tokio::test]
async fn test_insufficient_funds_is_not_a_conflict() {
    let h = harness(GatewayBehavior::AlwaysApprove);
    let result = h
        .orchestrator
        .handle(Request::Debit {
            user_id: "u1".into(),
            amount: dec!(5000),
            payment_id: "big".into(),
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    assert!(!err.is_retryable());
    let wallet = h.orchestrator.wallets().get_balance("u1").await.unwrap();
    assert_eq!(wallet.version, 0);
}
