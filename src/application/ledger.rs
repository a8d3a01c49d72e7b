use crate::domain::account::{Account, Amount, BalanceInfo, Currency, CurrencyBalance, OwnerId};
use crate::domain::ports::{
    AccountStoreBox, BalanceShift, ClockRef, TransactionFilter, TransactionInsert,
    TransactionStoreBox,
};
use crate::domain::transaction::{
    Metadata, Transaction, TransactionDraft, TransactionStatus,
};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// Whether a create stored a new row or was answered by an existing one
/// holding the same idempotency key.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Transaction),
    Replayed(Transaction),
}

/// Partial update applied without changing status: attach the processor
/// reference and/or merge metadata entries.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub processor_reference: Option<String>,
    pub metadata: Metadata,
}

/// Sole reader/writer of the account and transaction stores.
///
/// The ledger stamps ids and timestamps, enforces the status transition
/// table, and owns the operations that must be indivisible. Business
/// validation happens upstream in the orchestrator.
pub struct Ledger {
    accounts: AccountStoreBox,
    transactions: TransactionStoreBox,
    clock: ClockRef,
}

impl Ledger {
    pub fn new(
        accounts: AccountStoreBox,
        transactions: TransactionStoreBox,
        clock: ClockRef,
    ) -> Self {
        Self {
            accounts,
            transactions,
            clock,
        }
    }

    pub fn clock(&self) -> &ClockRef {
        &self.clock
    }

    /// Stores a new transaction row. If the draft carries an idempotency
    /// key already present in the store, the existing row is returned
    /// instead; the unique-key constraint makes this race-safe.
    pub async fn create_transaction(&self, draft: TransactionDraft) -> Result<CreateOutcome> {
        let now = self.clock.now();
        let tx = Transaction {
            id: self.clock.new_id(),
            payer: draft.payer,
            payee: draft.payee,
            amount: draft.amount,
            currency: draft.currency,
            status: draft.status,
            payment_method: draft.payment_method,
            processor_reference: None,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        match self.transactions.insert(tx.clone()).await? {
            TransactionInsert::Inserted => Ok(CreateOutcome::Created(tx)),
            TransactionInsert::DuplicateKey(existing) => Ok(CreateOutcome::Replayed(existing)),
        }
    }

    /// Advances a transaction's status, enforcing the forward-only
    /// transition table. `completed_at` is set iff the new status is
    /// `completed`.
    pub async fn update_status(
        &self,
        id: Uuid,
        next: TransactionStatus,
    ) -> Result<Transaction> {
        let mut tx = self.require(id).await?;
        if !tx.status.can_transition_to(next) {
            return Err(PaymentError::InvalidTransition {
                id,
                from: tx.status,
                to: next,
            });
        }
        tx.status = next;
        tx.updated_at = self.clock.now();
        if next == TransactionStatus::Completed {
            tx.completed_at = Some(tx.updated_at);
        }
        self.transactions.update(tx.clone()).await?;
        Ok(tx)
    }

    /// Applies a partial update (processor reference, metadata) without
    /// touching the status.
    pub async fn update_transaction(
        &self,
        id: Uuid,
        update: TransactionUpdate,
    ) -> Result<Transaction> {
        let mut tx = self.require(id).await?;
        if let Some(reference) = update.processor_reference {
            tx.processor_reference = Some(reference);
        }
        tx.metadata.extend(update.metadata);
        tx.updated_at = self.clock.now();
        self.transactions.update(tx.clone()).await?;
        Ok(tx)
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.transactions.get(id).await
    }

    pub async fn require_transaction(&self, id: Uuid) -> Result<Transaction> {
        self.require(id).await
    }

    async fn require(&self, id: Uuid) -> Result<Transaction> {
        self.transactions
            .get(id)
            .await?
            .ok_or(PaymentError::TransactionNotFound(id))
    }

    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>> {
        self.transactions.find_by_idempotency_key(key).await
    }

    /// Transaction history involving the owner (payer or payee), newest
    /// first.
    pub async fn list_transactions(
        &self,
        owner: &OwnerId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        self.transactions.list_for_owner(owner, filter).await
    }

    /// Amount already claimed by refunds of the given transaction.
    ///
    /// In-flight (`processing`) refunds count too, so two racing refunds
    /// cannot both pass the cumulative cap.
    pub async fn refunded_total(&self, original: Uuid) -> Result<Decimal> {
        let refunds = self.transactions.find_refunds_of(original).await?;
        Ok(refunds
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    TransactionStatus::Processing | TransactionStatus::Completed
                )
            })
            .map(|r| r.amount.value())
            .sum())
    }

    /// `processing` transactions last touched before the cutoff.
    pub async fn find_stuck_processing(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Transaction>> {
        self.transactions.find_processing_older_than(cutoff).await
    }

    /// Moves `amount` from payer to payee in one atomic unit of work.
    ///
    /// `SELF` legs are exempt from bookkeeping and dropped before the
    /// shift reaches the store; missing rows are created with zero
    /// balance; `InsufficientFunds` if the debit would go negative.
    pub async fn shift_balance(
        &self,
        payer: &OwnerId,
        payee: &OwnerId,
        amount: Amount,
        currency: Currency,
    ) -> Result<()> {
        let shift = BalanceShift {
            debit: (!payer.is_platform()).then(|| payer.clone()),
            credit: (!payee.is_platform()).then(|| payee.clone()),
            amount,
            currency,
        };
        if shift.debit.is_none() && shift.credit.is_none() {
            return Ok(());
        }
        self.accounts.apply_shift(shift).await
    }

    /// Per-currency balances for the owner; `None` if the owner holds no
    /// accounts. `pending_balance` sums `pending`/`processing`
    /// transactions involving the owner in the matching currency.
    pub async fn get_balance(&self, owner: &OwnerId) -> Result<Option<BalanceInfo>> {
        let accounts = self.accounts.list_for_owner(owner).await?;
        if accounts.is_empty() {
            return Ok(None);
        }

        let mut pending: HashMap<Currency, Decimal> = HashMap::new();
        for status in [TransactionStatus::Pending, TransactionStatus::Processing] {
            let filter = TransactionFilter {
                status: Some(status),
                ..Default::default()
            };
            for tx in self.transactions.list_for_owner(owner, &filter).await? {
                *pending.entry(tx.currency).or_default() += tx.amount.value();
            }
        }

        let mut balances: Vec<CurrencyBalance> = accounts
            .into_iter()
            .map(|account| {
                let pending_balance = pending
                    .get(&account.currency)
                    .copied()
                    .unwrap_or_default();
                CurrencyBalance {
                    currency: account.currency,
                    balance: account.balance.value(),
                    available_balance: account.balance.value() - pending_balance,
                    pending_balance,
                }
            })
            .collect();
        balances.sort_by_key(|b| b.currency.to_string());

        Ok(Some(BalanceInfo {
            owner: owner.clone(),
            balances,
        }))
    }

    pub async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.accounts.all().await
    }
}
