//! # Collaborator Traits
//!
//! The reconciler never touches storage directly. It talks to a
//! [`RuleStore`], which hands out a wallet-scoped [`RuleTransaction`], and to
//! a [`Terminator`] that retires rules nobody asked for any more.
//!
//! ## Transaction contract
//!
//! - `begin` takes the wallet's exclusive lock, waiting at most
//!   `lock_timeout`. A wait that runs out is [`StoreError::Conflict`].
//! - Nothing written through a transaction is visible to anyone else until
//!   `commit`. Dropping a transaction without committing discards it.
//! - `terminate_rule` is idempotent.
//!
//! Implementations: [`InMemoryRuleStore`](crate::memory::InMemoryRuleStore)
//! here and the Postgres store in `topup-api`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use topup_core::{RuleId, TopupError, WalletId};
use topup_state::{NewRule, NewWallet, RecurringTransactionRule, RulePatch, RuleStatus, Wallet};

/// Failure reported by a store or terminator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The wallet does not exist.
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),

    /// No active rule with this id exists in the wallet.
    #[error("rule {0} not found")]
    RuleNotFound(RuleId),

    /// Another transaction holds the wallet.
    #[error("wallet {0} is locked by a concurrent reconciliation")]
    Conflict(WalletId),

    /// Anything else the backend reports.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Which rules to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    Active,
    Terminated,
    All,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Terminated => "terminated",
            Self::All => "all",
        }
    }

    /// Whether a rule with `status` passes this filter.
    pub fn matches(&self, status: RuleStatus) -> bool {
        match self {
            Self::Active => status == RuleStatus::Active,
            Self::Terminated => status == RuleStatus::Terminated,
            Self::All => true,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "terminated" => Ok(Self::Terminated),
            "all" => Ok(Self::All),
            other => Err(TopupError::UnknownVariant {
                kind: "status filter",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable storage of wallets and their rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Persist a new wallet.
    async fn create_wallet(&self, new: NewWallet) -> Result<Wallet, StoreError>;

    /// Fetch a wallet.
    async fn get_wallet(&self, id: WalletId) -> Result<Wallet, StoreError>;

    /// List a wallet's rules in creation order.
    async fn list_rules(
        &self,
        wallet_id: WalletId,
        filter: StatusFilter,
    ) -> Result<Vec<RecurringTransactionRule>, StoreError>;

    /// Open a transaction holding the wallet's exclusive lock.
    async fn begin(
        &self,
        wallet_id: WalletId,
        lock_timeout: Duration,
    ) -> Result<Box<dyn RuleTransaction>, StoreError>;
}

/// A unit of work scoped to one wallet.
#[async_trait]
pub trait RuleTransaction: Send {
    /// The locked wallet.
    fn wallet(&self) -> &Wallet;

    /// The wallet's active rules, in creation order.
    async fn fetch_active_rules(&mut self) -> Result<Vec<RecurringTransactionRule>, StoreError>;

    /// Insert a new active rule with a fresh id.
    async fn create_rule(&mut self, new: NewRule) -> Result<RecurringTransactionRule, StoreError>;

    /// Overwrite the fields present in `patch` on an active rule.
    async fn update_rule(
        &mut self,
        id: RuleId,
        patch: &RulePatch,
    ) -> Result<RecurringTransactionRule, StoreError>;

    /// Mark a rule terminated. Terminating a terminated rule succeeds.
    async fn terminate_rule(&mut self, id: RuleId) -> Result<RecurringTransactionRule, StoreError>;

    /// Make every write visible and release the lock.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write and release the lock.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Retires a rule that is no longer desired.
///
/// Runs inside the reconciliation's transaction, so any side effect written
/// through `tx` commits or rolls back with the rest of the pass.
#[async_trait]
pub trait Terminator: Send + Sync {
    async fn terminate(
        &self,
        tx: &mut dyn RuleTransaction,
        rule: &RecurringTransactionRule,
    ) -> Result<(), StoreError>;
}

/// Terminator that only performs the status transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleTerminator;

#[async_trait]
impl Terminator for LifecycleTerminator {
    async fn terminate(
        &self,
        tx: &mut dyn RuleTransaction,
        rule: &RecurringTransactionRule,
    ) -> Result<(), StoreError> {
        tx.terminate_rule(rule.id).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_status() {
        assert!(StatusFilter::Active.matches(RuleStatus::Active));
        assert!(!StatusFilter::Active.matches(RuleStatus::Terminated));
        assert!(StatusFilter::Terminated.matches(RuleStatus::Terminated));
        assert!(StatusFilter::All.matches(RuleStatus::Active));
        assert!(StatusFilter::All.matches(RuleStatus::Terminated));
    }

    #[test]
    fn filter_parses() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert!("archived".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::default(), StatusFilter::Active);
    }
}
