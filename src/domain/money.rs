use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A wallet balance.
///
/// Wraps `rust_decimal::Decimal` so that balance arithmetic cannot be mixed up with
/// raw numbers coming from callers. Balances are allowed to be zero; debits are the
/// only operation that could push one below zero and the wallet ledger refuses those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

/// A strictly positive monetary amount.
///
/// Payment amounts, debits, credits and refunds are all expressed as `Amount`, so a
/// zero or negative value is rejected once at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "amount must be greater than 0".to_string(),
            ))
        }
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

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Whether this balance can cover `amount` without going negative.
    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
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

/// ISO-4217 style currency code: exactly three ASCII letters, stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, PaymentError> {
        let code = code.trim();
        if code.chars().count() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentError::ValidationError(format!(
                "invalid currency format: {:?}",
                code
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl TryFrom<String> for Currency {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1 + b2, Balance::new(dec!(15.0)));
        assert_eq!(b1 - b2, Balance::new(dec!(5.0)));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_amount_rejects_zero_when_deserialized() {
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
        let amount: Amount = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(amount.value(), dec!(12.50));
    }

    #[test]
    fn test_balance_covers() {
        let balance = Balance::new(dec!(100));
        assert!(balance.covers(Amount::new(dec!(100)).unwrap()));
        assert!(!balance.covers(Amount::new(dec!(100.01)).unwrap()));
    }

    #[test]
    fn test_currency_validation() {
        assert_eq!(Currency::new("usd").unwrap().as_str(), "USD");
        assert!(Currency::new("US").is_err());
        assert!(Currency::new("USDT").is_err());
        assert!(Currency::new("U$D").is_err());
        assert!(Currency::new("").is_err());
    }
}
