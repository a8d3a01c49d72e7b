use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use uuid::Uuid;

/// Reserved owner identifier for the platform's own side of a transfer.
///
/// Legs attributed to this owner are exempt from balance bookkeeping.
pub const PLATFORM_OWNER: &str = "SELF";

/// Identifies the owning party of an account or a transaction leg.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The platform's reserved owner id.
    pub fn platform() -> Self {
        Self(PLATFORM_OWNER.to_string())
    }

    pub fn is_platform(&self) -> bool {
        self.0 == PLATFORM_OWNER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Three-letter ISO-style currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Currency([u8; 3]);

impl Currency {
    /// Parses a currency code: exactly three ASCII letters, stored uppercase.
    pub fn parse(code: &str) -> Result<Self, PaymentError> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(PaymentError::Validation(format!(
                "invalid currency code: {code:?}"
            )));
        }
        let mut out = [0u8; 3];
        for (slot, b) in out.iter_mut().zip(bytes) {
            *slot = b.to_ascii_uppercase();
        }
        Ok(Self(out))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{}", char::from(b))?;
        }
        Ok(())
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Currency::parse(&code).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<&str> for Currency {
    type Error = PaymentError;

    fn try_from(code: &str) -> Result<Self, Self::Error> {
        Self::parse(code)
    }
}

/// A positive monetary amount with at most 4 decimal digits.
///
/// Wraps `rust_decimal::Decimal` so transaction amounts cannot be zero,
/// negative, or finer-grained than the ledger's fixed-point precision.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

/// Fixed-point precision of stored amounts and balances.
pub const AMOUNT_SCALE: u32 = 4;

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > AMOUNT_SCALE {
            return Err(PaymentError::Validation(format!(
                "amount {value} exceeds {AMOUNT_SCALE} decimal digits"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored balance of an account. The account store keeps this non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    User,
    Platform,
    Escrow,
    Merchant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored balance row: one per (owner, currency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub owner: OwnerId,
    pub account_type: AccountType,
    pub balance: Balance,
    pub currency: Currency,
    pub status: AccountStatus,
}

impl Account {
    /// Opens a fresh zero-balance account, as done lazily the first time an
    /// owner participates in a transaction in a given currency.
    pub fn open(owner: OwnerId, currency: Currency) -> Self {
        let account_type = if owner.is_platform() {
            AccountType::Platform
        } else {
            AccountType::User
        };
        Self {
            id: Uuid::new_v4(),
            owner,
            account_type,
            balance: Balance::ZERO,
            currency,
            status: AccountStatus::Active,
        }
    }
}

/// Per-currency balance view for one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyBalance {
    pub currency: Currency,
    pub balance: Decimal,
    /// `balance` minus the amounts tied up in non-terminal transactions.
    pub available_balance: Decimal,
    /// Sum of amounts of `pending`/`processing` transactions involving the owner.
    pub pending_balance: Decimal,
}

/// Balance answer for one owner across every currency they hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceInfo {
    pub owner: OwnerId,
    pub balances: Vec<CurrencyBalance>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_rejects_non_positive() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PaymentError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_rejects_excess_precision() {
        assert!(Amount::new(dec!(0.0001)).is_ok());
        assert!(Amount::new(dec!(0.00010000)).is_ok()); // trailing zeros are fine
        assert!(matches!(
            Amount::new(dec!(0.00001)),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1 + b2, Balance::new(dec!(15.0)));
        assert_eq!(b1 - b2, Balance::new(dec!(5.0)));
    }

    #[test]
    fn test_currency_parsing() {
        let usd = Currency::parse("usd").unwrap();
        assert_eq!(usd.to_string(), "USD");
        assert_eq!(usd, Currency::parse(" USD ").unwrap());
        assert!(Currency::parse("us").is_err());
        assert!(Currency::parse("USDT").is_err());
        assert!(Currency::parse("U5D").is_err());
    }

    #[test]
    fn test_currency_serde_round_trip() {
        let eur = Currency::parse("EUR").unwrap();
        let json = serde_json::to_string(&eur).unwrap();
        assert_eq!(json, "\"EUR\"");
        let back: Currency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, eur);
    }

    #[test]
    fn test_platform_owner() {
        assert!(OwnerId::platform().is_platform());
        assert!(!OwnerId::from("user_1").is_platform());
    }

    #[test]
    fn test_account_open_defaults() {
        let currency = Currency::parse("USD").unwrap();
        let account = Account::open(OwnerId::from("user_1"), currency);
        assert_eq!(account.balance, Balance::ZERO);
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.account_type, AccountType::User);

        let platform = Account::open(OwnerId::platform(), currency);
        assert_eq!(platform.account_type, AccountType::Platform);
    }
}
