use crate::domain::account::BalanceInfo;
use crate::error::Result;
use std::io::Write;

/// Writes the final balance report as CSV.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// One row per (owner, currency): balance, available, and pending.
    pub fn write_report(&mut self, report: &[BalanceInfo]) -> Result<()> {
        self.writer
            .write_record(["owner", "currency", "balance", "available", "pending"])?;
        for info in report {
            for entry in &info.balances {
                self.writer.write_record([
                    info.owner.as_str(),
                    &entry.currency.to_string(),
                    &entry.balance.to_string(),
                    &entry.available_balance.to_string(),
                    &entry.pending_balance.to_string(),
                ])?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Currency, CurrencyBalance, OwnerId};
    use rust_decimal_macros::dec;

    #[test]
    fn test_report_layout() {
        let report = vec![BalanceInfo {
            owner: OwnerId::from("user_1"),
            balances: vec![CurrencyBalance {
                currency: Currency::parse("USD").unwrap(),
                balance: dec!(10.00),
                available_balance: dec!(7.00),
                pending_balance: dec!(3.00),
            }],
        }];

        let mut buffer = Vec::new();
        BalanceWriter::new(&mut buffer).write_report(&report).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.starts_with("owner,currency,balance,available,pending\n"));
        assert!(output.contains("user_1,USD,10.00,7.00,3.00"));
    }
}
