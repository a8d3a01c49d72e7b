use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Accepted transaction amount range, inclusive on both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountLimits {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
}

impl Default for AmountLimits {
    fn default() -> Self {
        Self {
            min_amount: dec!(0.01),
            max_amount: dec!(10000.00),
        }
    }
}

/// The closed set of processor providers.
///
/// Adding a rail means adding a variant here and an implementation in
/// `infrastructure::processor`, not a conditional branch list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProcessorConfig {
    /// Pure-simulation rail for tests and demos: approves charges unless
    /// the failure roll says otherwise, after an artificial delay.
    Simulated {
        #[serde(default)]
        failure_rate: f64,
        #[serde(default)]
        latency_ms: u64,
    },
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig::Simulated {
            failure_rate: 0.0,
            latency_ms: 0,
        }
    }
}

/// Service-wide settings consumed by the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub limits: AmountLimits,
    pub refunds_enabled: RefundsEnabled,
    /// Deadline for each processor call; an overrun fails the transaction.
    pub processor_timeout_ms: ProcessorTimeoutMs,
    pub processor: ProcessorConfig,
}

// Newtype defaults so `#[serde(default)]` yields enabled refunds and a
// sane deadline rather than zero values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefundsEnabled(pub bool);

impl Default for RefundsEnabled {
    fn default() -> Self {
        Self(true)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessorTimeoutMs(pub u64);

impl Default for ProcessorTimeoutMs {
    fn default() -> Self {
        Self(5_000)
    }
}

impl ServiceConfig {
    /// Loads configuration from a JSON file, falling back to defaults for
    /// any omitted field.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ServiceConfig =
            serde_json::from_str(&raw).map_err(|e| PaymentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.min_amount <= Decimal::ZERO {
            return Err(PaymentError::Config(
                "limits.min_amount must be positive".to_string(),
            ));
        }
        if self.limits.max_amount < self.limits.min_amount {
            return Err(PaymentError::Config(
                "limits.max_amount must be >= limits.min_amount".to_string(),
            ));
        }
        match self.processor {
            ProcessorConfig::Simulated { failure_rate, .. } => {
                if !(0.0..=1.0).contains(&failure_rate) {
                    return Err(PaymentError::Config(
                        "processor.failure_rate must be within [0, 1]".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn refunds_enabled(&self) -> bool {
        self.refunds_enabled.0
    }

    pub fn processor_timeout(&self) -> Duration {
        Duration::from_millis(self.processor_timeout_ms.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.limits.min_amount, dec!(0.01));
        assert_eq!(config.limits.max_amount, dec!(10000.00));
        assert!(config.refunds_enabled());
        assert_eq!(config.processor_timeout(), Duration::from_millis(5_000));
        assert!(matches!(
            config.processor,
            ProcessorConfig::Simulated {
                failure_rate,
                latency_ms: 0,
            } if failure_rate == 0.0
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{
                "refunds_enabled": false,
                "processor": { "provider": "simulated", "failure_rate": 1.0 }
            }"#,
        )
        .unwrap();
        assert!(!config.refunds_enabled());
        assert_eq!(config.limits.min_amount, dec!(0.01));
        assert!(matches!(
            config.processor,
            ProcessorConfig::Simulated { failure_rate, .. } if failure_rate == 1.0
        ));
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut config = ServiceConfig::default();
        config.limits.max_amount = dec!(0.001);
        assert!(matches!(
            config.validate(),
            Err(PaymentError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_failure_rate() {
        let mut config = ServiceConfig::default();
        config.processor = ProcessorConfig::Simulated {
            failure_rate: 1.5,
            latency_ms: 0,
        };
        assert!(matches!(config.validate(), Err(PaymentError::Config(_))));
    }
}
