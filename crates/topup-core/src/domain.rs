//! # Rule Vocabulary
//!
//! The closed sets that shape a recurring transaction rule:
//!
//! - [`Trigger`] decides *when* a rule fires (on a calendar interval or
//!   when the ongoing balance drops to a threshold).
//! - [`Interval`] is the calendar period, meaningful only for
//!   `Trigger::Interval`.
//! - [`Method`] decides *how much* to top up (a fixed paid/granted amount,
//!   or enough to reach a target balance).
//!
//! String forms are lower snake case on the wire and in storage.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TopupError;

/// The condition class that causes a rule to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Fires once per calendar [`Interval`].
    Interval,
    /// Fires when the ongoing balance reaches `threshold_credits`.
    Threshold,
}

/// Calendar period for interval-triggered rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// How the top-up amount is computed when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Top up by the rule's paid and granted credit amounts.
    #[default]
    Fixed,
    /// Top up until the ongoing balance reaches `target_ongoing_balance`.
    Target,
}

impl Trigger {
    /// Return the string representation of this trigger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Threshold => "threshold",
        }
    }
}

impl Interval {
    /// Return the string representation of this interval.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// All intervals in ascending period length.
    pub fn all() -> &'static [Interval] {
        &[Self::Weekly, Self::Monthly, Self::Quarterly, Self::Yearly]
    }
}

impl Method {
    /// Return the string representation of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Target => "target",
        }
    }
}

impl FromStr for Trigger {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interval" => Ok(Self::Interval),
            "threshold" => Ok(Self::Threshold),
            other => Err(TopupError::UnknownVariant {
                kind: "trigger",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Interval {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            other => Err(TopupError::UnknownVariant {
                kind: "interval",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Method {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "target" => Ok(Self::Target),
            other => Err(TopupError::UnknownVariant {
                kind: "method",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
