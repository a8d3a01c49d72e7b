mod common;

use common::{balance_of, build_service, fund, request};
use payrail::config::ServiceConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let (service, _events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);
    let service = Arc::new(service);
    fund(&service, "payer", dec!(10.00)).await;

    // Ten racing transfers of 3.00 against a 10.00 balance: at most three
    // can win.
    let mut handles = Vec::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .process_transaction(request("payer", &format!("payee_{i}"), dec!(3.00)))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert_eq!(err.code(), "INSUFFICIENT_FUNDS"),
        }
    }
    assert!(successes <= 3, "{successes} transfers of 3.00 from 10.00");

    let payer = balance_of(&service, "payer").await;
    assert!(payer >= Decimal::ZERO);
    assert_eq!(payer, dec!(10.00) - dec!(3.00) * Decimal::from(successes));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_total() {
    let (service, _events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);
    let service = Arc::new(service);
    for owner in ["a", "b", "c"] {
        fund(&service, owner, dec!(50.00)).await;
    }

    let mut handles = Vec::new();
    for i in 0..30 {
        let service = Arc::clone(&service);
        let names = ["a", "b", "c"];
        let payer = names[i % 3];
        let payee = names[(i + 1) % 3];
        handles.push(tokio::spawn(async move {
            service
                .process_transaction(request(payer, payee, dec!(7.00)))
                .await
        }));
    }
    for handle in handles {
        // Individual transfers may fail on funds; conservation must hold
        // regardless.
        let _ = handle.await.unwrap();
    }

    let total = balance_of(&service, "a").await
        + balance_of(&service, "b").await
        + balance_of(&service, "c").await;
    assert_eq!(total, dec!(150.00));

    for owner in ["a", "b", "c"] {
        assert!(balance_of(&service, owner).await >= Decimal::ZERO);
    }
}
