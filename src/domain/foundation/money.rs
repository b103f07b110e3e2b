//! Money value object: an amount in minor units plus an ISO currency code.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount_cents: i64,
    currency: String,
}

impl Money {
    /// Creates an amount. Currency codes are normalized to upper case.
    pub fn new(amount_cents: i64, currency: impl AsRef<str>) -> Result<Self, ValidationError> {
        if amount_cents < 0 {
            return Err(ValidationError::out_of_range(
                "amount_cents",
                0,
                i64::MAX,
                amount_cents,
            ));
        }
        let currency = currency.as_ref().trim().to_ascii_uppercase();
        if currency.len() < 3 || currency.len() > 10 || !currency.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::invalid_format(
                "currency",
                "must be an ISO-4217 or ticker code",
            ));
        }
        Ok(Self {
            amount_cents,
            currency,
        })
    }

    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Decimal major-unit rendering, e.g. `1000` cents -> `"10.00"`.
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.amount_cents / 100, self.amount_cents % 100)
    }

    /// Major units as a float, for provider APIs that take JSON numbers.
    pub fn as_major_units(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minor_units_as_decimal() {
        let m = Money::new(1000, "usd").unwrap();
        assert_eq!(m.to_decimal_string(), "10.00");
        assert_eq!(m.currency(), "USD");
        assert_eq!(m.to_string(), "10.00 USD");

        assert_eq!(Money::new(5, "EUR").unwrap().to_decimal_string(), "0.05");
        assert_eq!(Money::new(1999, "EUR").unwrap().as_major_units(), 19.99);
    }

    #[test]
    fn rejects_negative_amounts() {
        assert!(Money::new(-1, "USD").is_err());
    }

    #[test]
    fn rejects_malformed_currency() {
        assert!(Money::new(100, "").is_err());
        assert!(Money::new(100, "U$").is_err());
    }
}
