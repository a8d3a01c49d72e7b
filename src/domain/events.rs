use crate::domain::transaction::Transaction;
use tokio::sync::mpsc;

/// Domain events emitted after a successful terminal state transition.
///
/// The orchestrator writes these to an explicit channel; delivery is
/// best-effort and outside the consistency boundary, so a dropped
/// receiver is not an error.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    TransactionCompleted(Transaction),
    RefundCompleted(Transaction),
}

impl DomainEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::TransactionCompleted(_) => "transaction:completed",
            DomainEvent::RefundCompleted(_) => "refund:completed",
        }
    }

    pub fn transaction(&self) -> &Transaction {
        match self {
            DomainEvent::TransactionCompleted(tx) | DomainEvent::RefundCompleted(tx) => tx,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<DomainEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<DomainEvent>;
