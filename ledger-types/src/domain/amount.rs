//! Validated monetary amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Maximum number of decimal places an amount may carry.
pub const MAX_SCALE: u32 = 2;

/// A strictly positive monetary amount with at most two decimal places.
///
/// Amounts are decimal, never floating point, so repeated small credits and
/// debits cannot drift. The value is always stored at scale 2
/// (`100` becomes `100.00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Creates a new Amount.
    ///
    /// # Errors
    /// - `DomainError::NonPositiveAmount` if value <= 0
    /// - `DomainError::TooManyDecimals` if the value needs more than two decimal places
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::NonPositiveAmount(value));
        }

        let scale = value.normalize().scale();
        if scale > MAX_SCALE {
            return Err(DomainError::TooManyDecimals {
                max: MAX_SCALE,
                got: scale,
            });
        }

        let mut value = value;
        value.rescale(MAX_SCALE);
        Ok(Self(value))
    }

    /// Returns the underlying decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str(s.trim()).map_err(|_| DomainError::MalformedAmount(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
