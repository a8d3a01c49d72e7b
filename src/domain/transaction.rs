use crate::domain::account::{Amount, Currency, OwnerId};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque key-value annotations carried by a transaction.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key tagging a transaction with a caller-supplied idempotency key.
pub const IDEMPOTENCY_KEY: &str = "idempotency_key";
/// Metadata key linking a refund transaction back to the transaction it refunds.
pub const ORIGINAL_TRANSACTION_ID: &str = "original_transaction_id";
/// Metadata key on the original transaction listing its refund transactions.
pub const REFUND_TRANSACTION_IDS: &str = "refund_transaction_ids";
/// Metadata key carrying the caller's refund reason, when given.
pub const REFUND_REASON: &str = "refund_reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses never re-open; a refund is a second transaction.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Failed
                | TransactionStatus::Refunded
                | TransactionStatus::Cancelled
        )
    }

    /// The forward-only transition table of the state machine.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Refunded)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = PaymentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(PaymentError::Validation(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

/// An immutable-amount money movement between two parties.
///
/// Created by the ledger in `pending` and advanced by the orchestrator;
/// the amount and the parties never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub payer: OwnerId,
    pub payee: OwnerId,
    pub amount: Amount,
    pub currency: Currency,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    /// External rail's identifier, set once a charge succeeds.
    pub processor_reference: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, on the transition into `completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn idempotency_key(&self) -> Option<&str> {
        self.metadata.get(IDEMPOTENCY_KEY).map(String::as_str)
    }

    /// For refund transactions: the id of the transaction being refunded.
    pub fn original_transaction_id(&self) -> Option<Uuid> {
        self.metadata
            .get(ORIGINAL_TRANSACTION_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    pub fn is_refund(&self) -> bool {
        self.metadata.contains_key(ORIGINAL_TRANSACTION_ID)
    }

    /// Whether the owner is on either side of this transaction.
    pub fn involves(&self, owner: &OwnerId) -> bool {
        &self.payer == owner || &self.payee == owner
    }
}

/// Ledger input for a new transaction row. The ledger assigns the id and
/// the timestamps; the orchestrator has already validated business rules.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub payer: OwnerId,
    pub payee: OwnerId,
    pub amount: Amount,
    pub currency: Currency,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    pub metadata: Metadata,
}

/// A caller's request to move money from `payer` to `payee`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub payer: OwnerId,
    pub payee: OwnerId,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A caller's request to refund a completed transaction, fully or in part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: Uuid,
    /// Defaults to the original transaction's full amount.
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Refunded));
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        use TransactionStatus::*;
        for terminal in [Failed, Refunded, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Completed, Failed, Refunded, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        // `completed` is terminal but may flip to `refunded` via a refund.
        assert!(Completed.is_terminal());
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
    }

    #[test]
    fn test_no_backward_transitions() {
        use TransactionStatus::*;
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Cancelled));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Refunded,
            TransactionStatus::Cancelled,
        ] {
            assert_eq!(TransactionStatus::try_from(status.as_str()).unwrap(), status);
        }
        assert!(TransactionStatus::try_from("settled").is_err());
    }
}
