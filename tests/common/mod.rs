use payrail::application::ledger::Ledger;
use payrail::application::service::PaymentService;
use payrail::config::ServiceConfig;
use payrail::domain::account::{Currency, OwnerId};
use payrail::domain::events::EventReceiver;
use payrail::domain::transaction::{Metadata, PaymentRequest};
use payrail::infrastructure::clock::SystemClock;
use payrail::infrastructure::in_memory::{InMemoryAccountStore, InMemoryTransactionStore};
use payrail::infrastructure::processor::SimulatedProcessor;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Builds a service around a simulated processor whose handle is returned
/// too, so tests can pre-issue references or inspect the rail directly.
pub fn build_service(
    config: ServiceConfig,
    failure_rate: f64,
    latency: Duration,
) -> (PaymentService, EventReceiver, SimulatedProcessor) {
    let processor = SimulatedProcessor::new(failure_rate, latency);
    let (events, receiver) = tokio::sync::mpsc::unbounded_channel();
    let ledger = Ledger::new(
        Box::new(InMemoryAccountStore::new()),
        Box::new(InMemoryTransactionStore::new()),
        Arc::new(SystemClock),
    );
    let service = PaymentService::new(ledger, Box::new(processor.clone()), events, config);
    (service, receiver, processor)
}

pub fn usd() -> Currency {
    Currency::parse("USD").unwrap()
}

pub fn request(payer: &str, payee: &str, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        payer: OwnerId::from(payer),
        payee: OwnerId::from(payee),
        amount,
        currency: usd(),
        payment_method: None,
        idempotency_key: None,
        metadata: Metadata::new(),
    }
}

pub fn card_request(payer: &str, payee: &str, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        payment_method: Some("card_visa".to_string()),
        ..request(payer, payee, amount)
    }
}

/// Credits `owner` with `amount` via a platform payout.
pub async fn fund(service: &PaymentService, owner: &str, amount: Decimal) {
    service
        .process_transaction(request("SELF", owner, amount))
        .await
        .unwrap();
}

/// Stored balance of `owner` in USD, zero if no account exists.
pub async fn balance_of(service: &PaymentService, owner: &str) -> Decimal {
    match service.get_balance(&OwnerId::from(owner)).await.unwrap() {
        Some(info) => {
            info.balances
                .iter()
                .find(|b| b.currency == usd())
                .map(|b| b.balance)
                .unwrap_or_default()
        }
        None => Decimal::ZERO,
    }
}
