//! # Identifier Newtypes
//!
//! Wallet and rule identities. A rule identity is assigned once at creation
//! and never changes across updates.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TopupError;

/// Unique identifier for a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub Uuid);

/// Unique identifier for a recurring transaction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub Uuid);

impl WalletId {
    /// Generate a new random wallet identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl RuleId {
    /// Generate a new random rule identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Resolve an opaque caller-supplied identity.
    ///
    /// Returns `None` when the string is not a UUID; such an identity can
    /// never match a stored rule.
    pub fn resolve(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for WalletId {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TopupError::InvalidIdentifier(s.to_string()))
    }
}

impl FromStr for RuleId {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TopupError::InvalidIdentifier(s.to_string()))
    }
}

impl From<Uuid> for WalletId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<Uuid> for RuleId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
