use crate::application::ledger::{CreateOutcome, Ledger, TransactionUpdate};
use crate::config::ServiceConfig;
use crate::domain::account::{Amount, BalanceInfo, Currency, OwnerId};
use crate::domain::events::{DomainEvent, EventSender};
use crate::domain::ports::{ChargeOutcome, ProcessorBox, RefundOutcome, TransactionFilter};
use crate::domain::transaction::{
    IDEMPOTENCY_KEY, Metadata, ORIGINAL_TRANSACTION_ID, PaymentRequest, REFUND_REASON,
    REFUND_TRANSACTION_IDS, RefundRequest, Transaction, TransactionDraft, TransactionStatus,
};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Outcome of a processed request. `replayed` marks an idempotent replay:
/// the returned transaction was created by an earlier request carrying the
/// same idempotency key.
#[derive(Debug)]
pub struct ProcessedTransaction {
    pub transaction: Transaction,
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: &'static str,
    pub last_check: DateTime<Utc>,
}

/// The transaction orchestrator.
///
/// Drives the end-to-end state machine: validation, idempotency, the
/// pending record, the external processor call, balance shifts, final
/// status, and event emission. Holds its collaborators explicitly; one
/// instance is shared by reference across concurrent callers.
pub struct PaymentService {
    ledger: Ledger,
    processor: ProcessorBox,
    events: EventSender,
    config: ServiceConfig,
}

impl PaymentService {
    pub fn new(
        ledger: Ledger,
        processor: ProcessorBox,
        events: EventSender,
        config: ServiceConfig,
    ) -> Self {
        Self {
            ledger,
            processor,
            events,
            config,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Moves money from payer to payee.
    ///
    /// The external rail is engaged iff the request carries a payment
    /// method and the payer is not the platform (payouts never touch the
    /// rail). A successful charge funds the transfer from outside, so the
    /// payer's stored balance is left untouched in that case.
    pub async fn process_transaction(&self, request: PaymentRequest) -> Result<ProcessedTransaction> {
        let amount = self.validate_payment(&request)?;

        if let Some(key) = request.idempotency_key.as_deref()
            && let Some(existing) = self.ledger.find_by_idempotency_key(key).await?
        {
            tracing::info!(id = %existing.id, key, "idempotent replay");
            return Ok(ProcessedTransaction {
                transaction: existing,
                replayed: true,
            });
        }

        let mut metadata = request.metadata.clone();
        if let Some(key) = &request.idempotency_key {
            metadata.insert(IDEMPOTENCY_KEY.to_string(), key.clone());
        }

        let draft = TransactionDraft {
            payer: request.payer.clone(),
            payee: request.payee.clone(),
            amount,
            currency: request.currency,
            status: TransactionStatus::Pending,
            payment_method: request.payment_method.clone(),
            metadata,
        };
        let tx = match self.ledger.create_transaction(draft).await? {
            CreateOutcome::Created(tx) => tx,
            // Lost the compare-and-create race against a retry: answer with
            // the winner's row.
            CreateOutcome::Replayed(existing) => {
                return Ok(ProcessedTransaction {
                    transaction: existing,
                    replayed: true,
                });
            }
        };

        let mut externally_funded = false;
        if let Some(method) = request.payment_method.as_deref()
            && !request.payer.is_platform()
        {
            self.ledger
                .update_status(tx.id, TransactionStatus::Processing)
                .await?;
            match self.charge_with_deadline(amount, request.currency, method, &tx).await {
                Ok(charge) if charge.approved => {
                    let Some(reference) = charge.reference else {
                        self.fail(tx.id).await;
                        return Err(PaymentError::Processor(
                            "approved charge carried no reference".to_string(),
                        ));
                    };
                    self.ledger
                        .update_transaction(
                            tx.id,
                            TransactionUpdate {
                                processor_reference: Some(reference),
                                ..Default::default()
                            },
                        )
                        .await?;
                    externally_funded = true;
                }
                Ok(charge) => {
                    let reason = charge
                        .decline_reason
                        .unwrap_or_else(|| "charge declined".to_string());
                    tracing::warn!(id = %tx.id, reason, "charge declined");
                    self.fail(tx.id).await;
                    return Err(PaymentError::PaymentFailed(reason));
                }
                Err(err) => {
                    tracing::warn!(id = %tx.id, error = %err, "charge errored");
                    self.fail(tx.id).await;
                    return Err(err);
                }
            }
        }

        let effective_payer = if externally_funded {
            OwnerId::platform()
        } else {
            request.payer.clone()
        };
        if let Err(err) = self
            .ledger
            .shift_balance(&effective_payer, &request.payee, amount, request.currency)
            .await
        {
            self.fail(tx.id).await;
            return Err(err);
        }

        let completed = self
            .ledger
            .update_status(tx.id, TransactionStatus::Completed)
            .await?;
        tracing::info!(id = %completed.id, amount = %amount, "transaction completed");
        self.emit(DomainEvent::TransactionCompleted(completed.clone()));
        Ok(ProcessedTransaction {
            transaction: completed,
            replayed: false,
        })
    }

    /// Refunds a completed transaction, fully or in part, via a second
    /// transaction with the parties swapped. The original flips to
    /// `refunded` once cumulative refunds reach its amount.
    pub async fn process_refund(&self, request: RefundRequest) -> Result<ProcessedTransaction> {
        if !self.config.refunds_enabled() {
            return Err(PaymentError::RefundsDisabled);
        }

        let original = self
            .ledger
            .require_transaction(request.transaction_id)
            .await?;
        if original.status != TransactionStatus::Completed {
            return Err(PaymentError::InvalidTransactionStatus {
                id: original.id,
                actual: original.status,
                expected: TransactionStatus::Completed,
            });
        }

        let amount = match request.amount {
            Some(value) => Amount::new(value)?,
            None => original.amount,
        };
        let already_refunded = self.ledger.refunded_total(original.id).await?;
        let remaining = original.amount.value() - already_refunded;
        if amount.value() > remaining {
            return Err(PaymentError::Validation(format!(
                "refund amount {amount} exceeds remaining refundable {remaining}"
            )));
        }

        let mut metadata = Metadata::new();
        metadata.insert(ORIGINAL_TRANSACTION_ID.to_string(), original.id.to_string());
        if let Some(reason) = &request.reason {
            metadata.insert(REFUND_REASON.to_string(), reason.clone());
        }

        let draft = TransactionDraft {
            payer: original.payee.clone(),
            payee: original.payer.clone(),
            amount,
            currency: original.currency,
            status: TransactionStatus::Processing,
            payment_method: None,
            metadata,
        };
        let refund = match self.ledger.create_transaction(draft).await? {
            CreateOutcome::Created(tx) => tx,
            CreateOutcome::Replayed(existing) => {
                return Ok(ProcessedTransaction {
                    transaction: existing,
                    replayed: true,
                });
            }
        };

        let mut externally_refunded = false;
        if let Some(reference) = original.processor_reference.as_deref() {
            match self
                .refund_with_deadline(reference, amount, original.currency)
                .await
            {
                Ok(outcome) if outcome.approved => externally_refunded = true,
                Ok(outcome) => {
                    let reason = outcome
                        .decline_reason
                        .unwrap_or_else(|| "refund declined".to_string());
                    tracing::warn!(id = %refund.id, reason, "refund declined");
                    self.fail(refund.id).await;
                    return Err(PaymentError::RefundFailed(reason));
                }
                Err(err) => {
                    tracing::warn!(id = %refund.id, error = %err, "refund errored");
                    self.fail(refund.id).await;
                    return Err(err);
                }
            }
        }

        // An external refund returns the money to the rail, so the credit
        // leg is exempt from internal bookkeeping.
        let effective_payee = if externally_refunded {
            OwnerId::platform()
        } else {
            original.payer.clone()
        };
        if let Err(err) = self
            .ledger
            .shift_balance(&original.payee, &effective_payee, amount, original.currency)
            .await
        {
            self.fail(refund.id).await;
            return Err(err);
        }

        self.link_refund(&original, refund.id).await?;
        if already_refunded + amount.value() >= original.amount.value() {
            self.ledger
                .update_status(original.id, TransactionStatus::Refunded)
                .await?;
        }
        let completed = self
            .ledger
            .update_status(refund.id, TransactionStatus::Completed)
            .await?;
        tracing::info!(id = %completed.id, original = %original.id, "refund completed");
        self.emit(DomainEvent::RefundCompleted(completed.clone()));
        Ok(ProcessedTransaction {
            transaction: completed,
            replayed: false,
        })
    }

    /// Cancels a transaction that has not started processing.
    pub async fn cancel_transaction(&self, id: Uuid) -> Result<Transaction> {
        let tx = self.ledger.require_transaction(id).await?;
        if tx.status != TransactionStatus::Pending {
            return Err(PaymentError::InvalidTransactionStatus {
                id,
                actual: tx.status,
                expected: TransactionStatus::Pending,
            });
        }
        self.ledger
            .update_status(id, TransactionStatus::Cancelled)
            .await
    }

    /// Recovery sweep for `processing` rows older than `older_than`.
    ///
    /// A row holding a processor reference is settled through `verify`:
    /// verified charges get their (externally funded) balance shift and
    /// complete; unverified ones fail. Rows without a reference never
    /// moved money and are failed outright. Rows whose verification
    /// errors are left for the next sweep.
    pub async fn reconcile(&self, older_than: Duration) -> Result<Vec<Transaction>> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| PaymentError::Validation(format!("invalid reconcile age: {e}")))?;
        let cutoff = self.ledger.clock().now() - age;
        let stuck = self.ledger.find_stuck_processing(cutoff).await?;

        let mut resolved = Vec::with_capacity(stuck.len());
        for tx in stuck {
            let Some(reference) = tx.processor_reference.clone() else {
                let failed = self
                    .ledger
                    .update_status(tx.id, TransactionStatus::Failed)
                    .await?;
                tracing::info!(id = %failed.id, "reconciled stuck transaction as failed");
                resolved.push(failed);
                continue;
            };

            match self.processor.verify(&reference).await {
                Ok(verify) if verify.verified => {
                    if let Err(err) = self
                        .ledger
                        .shift_balance(&OwnerId::platform(), &tx.payee, tx.amount, tx.currency)
                        .await
                    {
                        tracing::warn!(id = %tx.id, error = %err, "reconcile shift failed");
                        self.fail(tx.id).await;
                        continue;
                    }
                    let completed = self
                        .ledger
                        .update_status(tx.id, TransactionStatus::Completed)
                        .await?;
                    tracing::info!(id = %completed.id, "reconciled verified charge as completed");
                    self.emit(DomainEvent::TransactionCompleted(completed.clone()));
                    resolved.push(completed);
                }
                Ok(_) => {
                    let failed = self
                        .ledger
                        .update_status(tx.id, TransactionStatus::Failed)
                        .await?;
                    tracing::info!(id = %failed.id, "reconciled unverified charge as failed");
                    resolved.push(failed);
                }
                Err(err) => {
                    tracing::warn!(id = %tx.id, error = %err, "verify errored; deferring");
                }
            }
        }
        Ok(resolved)
    }

    pub async fn get_balance(&self, owner: &OwnerId) -> Result<Option<BalanceInfo>> {
        self.ledger.get_balance(owner).await
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.ledger.get_transaction(id).await
    }

    pub async fn list_transactions(
        &self,
        owner: &OwnerId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        self.ledger.list_transactions(owner, filter).await
    }

    pub async fn health_check(&self) -> HealthStatus {
        let status = match self.ledger.get_transaction(Uuid::nil()).await {
            Ok(_) => "ok",
            Err(_) => "degraded",
        };
        HealthStatus {
            status,
            last_check: self.ledger.clock().now(),
        }
    }

    fn validate_payment(&self, request: &PaymentRequest) -> Result<Amount> {
        if request.payer.is_empty() || request.payee.is_empty() {
            return Err(PaymentError::Validation(
                "payer and payee are required".to_string(),
            ));
        }
        if request.payer == request.payee {
            return Err(PaymentError::Validation(
                "payer and payee must differ".to_string(),
            ));
        }
        let amount = Amount::new(request.amount)?;
        let limits = &self.config.limits;
        if request.amount < limits.min_amount || request.amount > limits.max_amount {
            return Err(PaymentError::Validation(format!(
                "amount {} outside allowed range [{}, {}]",
                request.amount, limits.min_amount, limits.max_amount
            )));
        }
        Ok(amount)
    }

    async fn charge_with_deadline(
        &self,
        amount: Amount,
        currency: Currency,
        method: &str,
        tx: &Transaction,
    ) -> Result<ChargeOutcome> {
        match tokio::time::timeout(
            self.config.processor_timeout(),
            self.processor.charge(amount, currency, method, &tx.metadata),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PaymentError::PaymentFailed(format!(
                "processor {} timed out",
                self.processor.name()
            ))),
        }
    }

    async fn refund_with_deadline(
        &self,
        reference: &str,
        amount: Amount,
        currency: Currency,
    ) -> Result<RefundOutcome> {
        match tokio::time::timeout(
            self.config.processor_timeout(),
            self.processor.refund(reference, amount, currency),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PaymentError::RefundFailed(format!(
                "processor {} timed out",
                self.processor.name()
            ))),
        }
    }

    /// Records the refund's id on the original so the two terminal rows
    /// reference each other.
    async fn link_refund(&self, original: &Transaction, refund_id: Uuid) -> Result<()> {
        let linked = match original.metadata.get(REFUND_TRANSACTION_IDS) {
            Some(existing) => format!("{existing},{refund_id}"),
            None => refund_id.to_string(),
        };
        let mut metadata = Metadata::new();
        metadata.insert(REFUND_TRANSACTION_IDS.to_string(), linked);
        self.ledger
            .update_transaction(original.id, TransactionUpdate {
                processor_reference: None,
                metadata,
            })
            .await?;
        Ok(())
    }

    /// Marks a transaction failed; mid-flow errors must never leave a row
    /// in `processing`.
    async fn fail(&self, id: Uuid) {
        if let Err(err) = self
            .ledger
            .update_status(id, TransactionStatus::Failed)
            .await
        {
            tracing::error!(%id, error = %err, "could not mark transaction failed");
        }
    }

    fn emit(&self, event: DomainEvent) {
        // Best-effort: a dropped receiver is outside the consistency boundary.
        if self.events.send(event).is_err() {
            tracing::debug!("event channel closed; event discarded");
        }
    }
}
