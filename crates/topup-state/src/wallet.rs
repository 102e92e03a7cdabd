//! # Wallet
//!
//! A wallet exclusively owns its recurring transaction rules. The only wallet
//! attribute reconciliation reads is `invoice_requires_successful_payment`,
//! which new rules inherit when the caller omits it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use topup_core::WalletId;

/// A wallet as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    #[serde(default)]
    pub name: Option<String>,
    /// Fallback for rules created without an explicit value.
    #[serde(default)]
    pub invoice_requires_successful_payment: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWallet {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub invoice_requires_successful_payment: bool,
}

impl Wallet {
    /// Build a wallet record with a fresh identity.
    pub fn create(new: NewWallet, now: DateTime<Utc>) -> Self {
        Self {
            id: WalletId::new(),
            name: new.name,
            invoice_requires_successful_payment: new.invoice_requires_successful_payment,
            created_at: now,
        }
    }
}
