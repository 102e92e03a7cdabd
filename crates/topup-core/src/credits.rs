//! # Credit Amounts
//!
//! `Credits` is a non-negative decimal. Amounts are never floats: they are
//! parsed from decimal strings (or JSON numbers, via their textual form) and
//! compared numerically, so `"1.0"` and `"1.00"` are the same amount.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TopupError;

/// A non-negative credit amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Credits(Decimal);

impl Credits {
    /// Zero credits, the persistence default for omitted amounts.
    pub const ZERO: Credits = Credits(Decimal::ZERO);

    /// Construct from a decimal, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Self, TopupError> {
        if value.is_zero() {
            return Ok(Self::ZERO);
        }
        if value.is_sign_negative() {
            return Err(TopupError::NegativeCredits(value.to_string()));
        }
        Ok(Self(value))
    }

    /// The underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Credits {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| TopupError::InvalidDecimal(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Credits {
    type Error = TopupError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Credits> for Decimal {
    fn from(c: Credits) -> Self {
        c.0
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Credits::new(value).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Credits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
