use crate::config::ProcessorConfig;
use crate::domain::account::{Amount, Currency};
use crate::domain::ports::{
    ChargeOutcome, PaymentProcessor, ProcessorBox, RefundOutcome, VerifyOutcome,
};
use crate::domain::transaction::Metadata;
use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Builds the processor implementation selected by configuration.
pub fn build_processor(config: &ProcessorConfig) -> ProcessorBox {
    match config {
        ProcessorConfig::Simulated {
            failure_rate,
            latency_ms,
        } => Box::new(SimulatedProcessor::new(
            *failure_rate,
            Duration::from_millis(*latency_ms),
        )),
    }
}

/// Pure-simulation payment rail.
///
/// Declines a configurable fraction of charges and refunds, sleeps for a
/// configurable latency to exercise deadline handling, and remembers the
/// references it issued so `verify` and `refund` answer coherently.
/// Clones share the issued-reference set.
#[derive(Clone)]
pub struct SimulatedProcessor {
    failure_rate: f64,
    latency: Duration,
    issued: Arc<Mutex<HashSet<String>>>,
}

impl SimulatedProcessor {
    pub fn new(failure_rate: f64, latency: Duration) -> Self {
        Self {
            failure_rate,
            latency,
            issued: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn roll_failure(&self) -> bool {
        self.failure_rate > 0.0 && rand::thread_rng().r#gen::<f64>() < self.failure_rate
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn charge(
        &self,
        _amount: Amount,
        _currency: Currency,
        _method: &str,
        _metadata: &Metadata,
    ) -> Result<ChargeOutcome> {
        self.simulate_latency().await;
        if self.roll_failure() {
            return Ok(ChargeOutcome::declined("simulated charge decline"));
        }
        let reference = format!("sim_{}", Uuid::new_v4().simple());
        self.issued.lock().await.insert(reference.clone());
        Ok(ChargeOutcome::approved(reference))
    }

    async fn refund(
        &self,
        reference: &str,
        _amount: Amount,
        _currency: Currency,
    ) -> Result<RefundOutcome> {
        self.simulate_latency().await;
        if !self.issued.lock().await.contains(reference) {
            return Ok(RefundOutcome::declined(format!(
                "unknown reference {reference}"
            )));
        }
        if self.roll_failure() {
            return Ok(RefundOutcome::declined("simulated refund decline"));
        }
        Ok(RefundOutcome::approved())
    }

    async fn verify(&self, reference: &str) -> Result<VerifyOutcome> {
        self.simulate_latency().await;
        let known = self.issued.lock().await.contains(reference);
        Ok(VerifyOutcome {
            verified: known,
            status: if known { "settled" } else { "unknown" }.to_string(),
        })
    }
}
