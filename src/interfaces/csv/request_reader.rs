use crate::domain::account::{Currency, OwnerId};
use crate::domain::transaction::{Metadata, PaymentRequest};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct RequestRecord {
    payer: String,
    payee: String,
    amount: Decimal,
    currency: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    idempotency_key: Option<String>,
}

impl TryFrom<RequestRecord> for PaymentRequest {
    type Error = PaymentError;

    fn try_from(record: RequestRecord) -> Result<Self> {
        Ok(PaymentRequest {
            payer: OwnerId::new(record.payer),
            payee: OwnerId::new(record.payee),
            amount: record.amount,
            currency: Currency::parse(&record.currency)?,
            payment_method: record.method.filter(|m| !m.is_empty()),
            idempotency_key: record.idempotency_key.filter(|k| !k.is_empty()),
            metadata: Metadata::new(),
        })
    }
}

/// Reads payment requests from a CSV source.
///
/// Wraps `csv::Reader` and yields an iterator over `Result<PaymentRequest>`,
/// trimming whitespace and tolerating missing trailing fields so large
/// files stream without loading into memory.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn requests(self) -> impl Iterator<Item = Result<PaymentRequest>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map_err(PaymentError::from)
                .and_then(|record: RequestRecord| PaymentRequest::try_from(record))
        })
    }
}
