mod common;

use common::{balance_of, build_service, card_request, fund, request, usd};
use payrail::config::{RefundsEnabled, ServiceConfig};
use payrail::domain::account::OwnerId;
use payrail::domain::transaction::{
    Metadata, REFUND_TRANSACTION_IDS, RefundRequest, TransactionDraft, TransactionStatus,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use uuid::Uuid;

fn refund_request(id: Uuid, amount: Option<Decimal>) -> RefundRequest {
    RefundRequest {
        transaction_id: id,
        amount,
        reason: None,
    }
}

#[tokio::test]
async fn test_full_refund_restores_balances_and_links_records() {
    let (service, mut events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);
    fund(&service, "user_1", dec!(100.00)).await;

    let original = service
        .process_transaction(request("user_1", "user_2", dec!(40.00)))
        .await
        .unwrap()
        .transaction;
    // Drain the two completion events so the refund event is next.
    events.try_recv().unwrap();
    events.try_recv().unwrap();

    let refund = service
        .process_refund(refund_request(original.id, None))
        .await
        .unwrap()
        .transaction;

    assert_eq!(balance_of(&service, "user_1").await, dec!(100.00));
    assert_eq!(balance_of(&service, "user_2").await, dec!(0.00));

    // Two terminal records referencing each other.
    let original = service
        .get_transaction(original.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.status, TransactionStatus::Refunded);
    assert_eq!(refund.status, TransactionStatus::Completed);
    assert_eq!(refund.original_transaction_id(), Some(original.id));
    assert_eq!(
        original.metadata.get(REFUND_TRANSACTION_IDS).unwrap(),
        &refund.id.to_string()
    );

    // Parties are swapped on the refund record.
    assert_eq!(refund.payer, original.payee);
    assert_eq!(refund.payee, original.payer);

    assert_eq!(events.try_recv().unwrap().name(), "refund:completed");
}

#[tokio::test]
async fn test_partial_refunds_accumulate_to_the_cap() {
    let (service, _events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);
    fund(&service, "user_1", dec!(100.00)).await;
    let original = service
        .process_transaction(request("user_1", "user_2", dec!(40.00)))
        .await
        .unwrap()
        .transaction;

    service
        .process_refund(refund_request(original.id, Some(dec!(10.00))))
        .await
        .unwrap();
    let after_first = service
        .get_transaction(original.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_first.status, TransactionStatus::Completed);

    // More than the remaining 30.00 is rejected before any mutation.
    let err = service
        .process_refund(refund_request(original.id, Some(dec!(35.00))))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    service
        .process_refund(refund_request(original.id, Some(dec!(30.00))))
        .await
        .unwrap();
    let after_full = service
        .get_transaction(original.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_full.status, TransactionStatus::Refunded);
    assert_eq!(balance_of(&service, "user_1").await, dec!(100.00));
    assert_eq!(balance_of(&service, "user_2").await, dec!(0.00));

    // A fully refunded transaction cannot be refunded again.
    let err = service
        .process_refund(refund_request(original.id, Some(dec!(1.00))))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSACTION_STATUS");
}

#[tokio::test]
async fn test_refund_rejects_non_positive_amount() {
    let (service, _events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);
    fund(&service, "user_1", dec!(10.00)).await;
    let original = service
        .process_transaction(request("user_1", "user_2", dec!(5.00)))
        .await
        .unwrap()
        .transaction;

    let err = service
        .process_refund(refund_request(original.id, Some(dec!(0.00))))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_refunds_disabled_gate() {
    let mut config = ServiceConfig::default();
    config.refunds_enabled = RefundsEnabled(false);
    let (service, _events, _sim) = build_service(config, 0.0, Duration::ZERO);

    let err = service
        .process_refund(refund_request(Uuid::new_v4(), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REFUNDS_DISABLED");
}

#[tokio::test]
async fn test_refund_requires_completed_original() {
    let (service, _events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);

    let err = service
        .process_refund(refund_request(Uuid::new_v4(), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TRANSACTION_NOT_FOUND");

    // A failed transaction is terminal but not refundable.
    service
        .process_transaction(request("user_1", "user_2", dec!(5.00)))
        .await
        .unwrap_err();
    let failed = service
        .list_transactions(&OwnerId::from("user_1"), &Default::default())
        .await
        .unwrap()
        .remove(0);
    let err = service
        .process_refund(refund_request(failed.id, None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSACTION_STATUS");
}

#[tokio::test]
async fn test_external_refund_returns_money_to_the_rail() {
    let (service, _events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);

    let original = service
        .process_transaction(card_request("user_1", "SELF", dec!(49.99)))
        .await
        .unwrap()
        .transaction;
    assert!(original.processor_reference.is_some());

    let refund = service
        .process_refund(refund_request(original.id, None))
        .await
        .unwrap()
        .transaction;
    assert_eq!(refund.status, TransactionStatus::Completed);

    // Charge and refund both happened on the rail: stored balances never moved.
    assert_eq!(balance_of(&service, "user_1").await, Decimal::ZERO);
    let original = service
        .get_transaction(original.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.status, TransactionStatus::Refunded);
}

#[tokio::test]
async fn test_declined_external_refund_fails_without_side_effects() {
    let (service, _events, _sim) = build_service(ServiceConfig::default(), 0.0, Duration::ZERO);
    fund(&service, "user_2", dec!(20.00)).await;

    // A completed charge whose reference the rail does not recognize.
    let created = service
        .ledger()
        .create_transaction(TransactionDraft {
            payer: OwnerId::from("user_1"),
            payee: OwnerId::from("user_2"),
            amount: dec!(20.00).try_into().unwrap(),
            currency: usd(),
            status: TransactionStatus::Pending,
            payment_method: Some("card_visa".to_string()),
            metadata: Metadata::new(),
        })
        .await
        .unwrap();
    let original = match created {
        payrail::application::ledger::CreateOutcome::Created(tx) => tx,
        payrail::application::ledger::CreateOutcome::Replayed(tx) => tx,
    };
    service
        .ledger()
        .update_transaction(
            original.id,
            payrail::application::ledger::TransactionUpdate {
                processor_reference: Some("sim_forgotten".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service
        .ledger()
        .update_status(original.id, TransactionStatus::Completed)
        .await
        .unwrap();

    let err = service
        .process_refund(refund_request(original.id, None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REFUND_FAILED");

    // Refund row failed; the original and all balances are untouched.
    let original = service
        .get_transaction(original.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.status, TransactionStatus::Completed);
    assert_eq!(balance_of(&service, "user_2").await, dec!(20.00));

    let refunds = service
        .list_transactions(&OwnerId::from("user_2"), &Default::default())
        .await
        .unwrap()
        .into_iter()
        .filter(|tx| tx.is_refund())
        .collect::<Vec<_>>();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].status, TransactionStatus::Failed);
}
