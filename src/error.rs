use crate::domain::transaction::TransactionStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for ledger and service operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors surfaced by the ledger, the orchestrator, and their adapters.
///
/// Business-level failures carry a stable machine-readable code (see
/// [`PaymentError::code`]) so callers can build wire envelopes without
/// matching on variants. Infrastructure faults map to `INTERNAL_ERROR`.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Bad request shape, amount, or parties. Raised before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced transaction does not exist.
    #[error("transaction {0} not found")]
    TransactionNotFound(Uuid),

    /// A debit would drive a stored balance below zero.
    #[error("insufficient funds for {owner}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        owner: String,
        balance: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },

    /// The external processor declined or timed out on a charge.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// The external processor declined or timed out on a refund.
    #[error("refund failed: {0}")]
    RefundFailed(String),

    /// The transaction is not in the status the operation requires.
    #[error("transaction {id} is {actual}, expected {expected}")]
    InvalidTransactionStatus {
        id: Uuid,
        actual: TransactionStatus,
        expected: TransactionStatus,
    },

    /// A status change that the state machine does not permit.
    #[error("cannot transition transaction {id} from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Refund processing is switched off by configuration.
    #[error("refunds are disabled")]
    RefundsDisabled,

    /// Storage collaborator fault.
    #[error("storage error: {0}")]
    Storage(String),

    /// Processor collaborator infrastructure fault (not a decline).
    #[error("processor error: {0}")]
    Processor(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PaymentError {
    /// Stable error code for caller-facing result envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "VALIDATION_ERROR",
            PaymentError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            PaymentError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            PaymentError::PaymentFailed(_) => "PAYMENT_FAILED",
            PaymentError::RefundFailed(_) => "REFUND_FAILED",
            PaymentError::InvalidTransactionStatus { .. } | PaymentError::InvalidTransition { .. } => {
                "INVALID_TRANSACTION_STATUS"
            }
            PaymentError::RefundsDisabled => "REFUNDS_DISABLED",
            PaymentError::Storage(_)
            | PaymentError::Processor(_)
            | PaymentError::Config(_)
            | PaymentError::Io(_)
            | PaymentError::Csv(_) => "INTERNAL_ERROR",
        }
    }
}
