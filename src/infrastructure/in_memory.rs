use crate::domain::account::{Account, AccountStatus, Balance, Currency, OwnerId};
use crate::domain::ports::{
    AccountStore, BalanceShift, TransactionFilter, TransactionInsert, TransactionStore,
};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe in-memory account table, keyed by (owner, currency).
///
/// The single write guard is the serialization point: both legs of a
/// shift apply under it or not at all, and concurrent shifts touching the
/// same account cannot lose updates.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<(OwnerId, Currency), Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn require_active(account: &Account) -> Result<()> {
    if account.status != AccountStatus::Active {
        return Err(PaymentError::Validation(format!(
            "account for {} is {}",
            account.owner, account.status
        )));
    }
    Ok(())
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, owner: &OwnerId, currency: Currency) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&(owner.clone(), currency)).cloned())
    }

    async fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .filter(|a| &a.owner == owner)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().cloned().collect())
    }

    async fn apply_shift(&self, shift: BalanceShift) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let amount = Balance::from(shift.amount);

        // Validate both legs before mutating either; a failed shift leaves
        // no trace, not even a freshly created row.
        if let Some(owner) = &shift.debit {
            let balance = match accounts.get(&(owner.clone(), shift.currency)) {
                Some(account) => {
                    require_active(account)?;
                    account.balance
                }
                None => Balance::ZERO,
            };
            if balance < amount {
                return Err(PaymentError::InsufficientFunds {
                    owner: owner.to_string(),
                    balance: balance.value(),
                    requested: shift.amount.value(),
                });
            }
        }
        if let Some(owner) = &shift.credit
            && let Some(account) = accounts.get(&(owner.clone(), shift.currency))
        {
            require_active(account)?;
        }

        if let Some(owner) = &shift.debit
            && let Some(account) = accounts.get_mut(&(owner.clone(), shift.currency))
        {
            account.balance -= amount;
        }
        if let Some(owner) = &shift.credit {
            let account = accounts
                .entry((owner.clone(), shift.currency))
                .or_insert_with(|| Account::open(owner.clone(), shift.currency));
            account.balance += amount;
        }
        Ok(())
    }
}

#[derive(Default)]
struct TransactionTable {
    rows: HashMap<Uuid, (u64, Transaction)>,
    by_idempotency_key: HashMap<String, Uuid>,
    next_seq: u64,
}

/// Thread-safe in-memory transaction log with a unique idempotency-key
/// index and a monotonic insertion sequence for stable newest-first
/// listings.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    table: Arc<RwLock<TransactionTable>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, tx: Transaction) -> Result<TransactionInsert> {
        let mut table = self.table.write().await;

        if tx.payer == tx.payee {
            return Err(PaymentError::Storage(
                "payer and payee must differ".to_string(),
            ));
        }
        if let Some(key) = tx.idempotency_key()
            && let Some(existing_id) = table.by_idempotency_key.get(key)
            && let Some((_, existing)) = table.rows.get(existing_id)
        {
            return Ok(TransactionInsert::DuplicateKey(existing.clone()));
        }

        if let Some(key) = tx.idempotency_key() {
            let key = key.to_string();
            table.by_idempotency_key.insert(key, tx.id);
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        table.rows.insert(tx.id, (seq, tx));
        Ok(TransactionInsert::Inserted)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).map(|(_, tx)| tx.clone()))
    }

    async fn update(&self, tx: Transaction) -> Result<()> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&tx.id) {
            Some(slot) => {
                slot.1 = tx;
                Ok(())
            }
            None => Err(PaymentError::TransactionNotFound(tx.id)),
        }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>> {
        let table = self.table.read().await;
        Ok(table
            .by_idempotency_key
            .get(key)
            .and_then(|id| table.rows.get(id))
            .map(|(_, tx)| tx.clone()))
    }

    async fn list_for_owner(
        &self,
        owner: &OwnerId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let table = self.table.read().await;
        let mut matches: Vec<(u64, Transaction)> = table
            .rows
            .values()
            .filter(|(_, tx)| tx.involves(owner))
            .filter(|(_, tx)| filter.status.is_none_or(|status| tx.status == status))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, tx)| tx)
            .collect())
    }

    async fn find_refunds_of(&self, original: Uuid) -> Result<Vec<Transaction>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|(_, tx)| tx.original_transaction_id() == Some(original))
            .map(|(_, tx)| tx.clone())
            .collect())
    }

    async fn find_processing_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|(_, tx)| tx.status == TransactionStatus::Processing && tx.updated_at < cutoff)
            .map(|(_, tx)| tx.clone())
            .collect())
    }
}
