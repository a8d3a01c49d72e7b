use crate::domain::account::{Account, Amount, Currency, OwnerId};
use crate::domain::transaction::{Metadata, Transaction, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Filters for transaction history listings.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Outcome of a compare-and-create insert.
///
/// `DuplicateKey` carries the transaction already holding the idempotency
/// key, so a retried request can be answered with the prior result even
/// when two creates race.
#[derive(Debug)]
pub enum TransactionInsert {
    Inserted,
    DuplicateKey(Transaction),
}

/// An atomic dual-leg balance change: either both legs apply or neither.
///
/// An absent leg is exempt from bookkeeping (the platform side, or a leg
/// funded by the external rail). Missing account rows are created with a
/// zero balance before the legs apply.
#[derive(Debug, Clone)]
pub struct BalanceShift {
    pub debit: Option<OwnerId>,
    pub credit: Option<OwnerId>,
    pub amount: Amount,
    pub currency: Currency,
}

/// Storage collaborator for account rows, keyed by (owner, currency).
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, owner: &OwnerId, currency: Currency) -> Result<Option<Account>>;

    /// All accounts held by one owner, across currencies.
    async fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Account>>;

    async fn all(&self) -> Result<Vec<Account>>;

    /// Applies both legs of a shift under one unit of work, enforcing the
    /// non-negative balance invariant on the debited account.
    async fn apply_shift(&self, shift: BalanceShift) -> Result<()>;
}

/// Storage collaborator for the transaction log.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts a new row. Fails the unique idempotency-key constraint by
    /// returning the existing row instead of creating a second one.
    async fn insert(&self, tx: Transaction) -> Result<TransactionInsert>;

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>>;

    /// Replaces an existing row. `TransactionNotFound` if the id is unknown.
    async fn update(&self, tx: Transaction) -> Result<()>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>>;

    /// Transactions where the owner is payer or payee, newest first.
    async fn list_for_owner(
        &self,
        owner: &OwnerId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>>;

    /// Refund transactions linked to the given original.
    async fn find_refunds_of(&self, original: Uuid) -> Result<Vec<Transaction>>;

    /// `processing` rows last touched before the cutoff; reconciliation input.
    async fn find_processing_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>>;
}

/// Result of a charge attempt. A decline is data, not an error; only
/// infrastructure faults surface through `Result`.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub approved: bool,
    pub reference: Option<String>,
    pub decline_reason: Option<String>,
}

impl ChargeOutcome {
    pub fn approved(reference: impl Into<String>) -> Self {
        Self {
            approved: true,
            reference: Some(reference.into()),
            decline_reason: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reference: None,
            decline_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub approved: bool,
    pub decline_reason: Option<String>,
}

impl RefundOutcome {
    pub fn approved() -> Self {
        Self {
            approved: true,
            decline_reason: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            decline_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub verified: bool,
    pub status: String,
}

/// Processor collaborator: the external money-movement rail.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn charge(
        &self,
        amount: Amount,
        currency: Currency,
        method: &str,
        metadata: &Metadata,
    ) -> Result<ChargeOutcome>;

    async fn refund(
        &self,
        reference: &str,
        amount: Amount,
        currency: Currency,
    ) -> Result<RefundOutcome>;

    async fn verify(&self, reference: &str) -> Result<VerifyOutcome>;
}

/// Clock/id collaborator: unique identifiers and timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn new_id(&self) -> Uuid;
}

pub type AccountStoreBox = Box<dyn AccountStore>;
pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type ProcessorBox = Box<dyn PaymentProcessor>;
pub type ClockRef = Arc<dyn Clock>;
