//! # In-Memory Rule Store
//!
//! A [`RuleStore`] backed by process memory. Used by the CLI, by the API when
//! no database is configured, and by tests.
//!
//! Each wallet has its own async mutex. A transaction holds the wallet's
//! guard and works on a private copy of the wallet's rules; `commit` writes
//! the copy back in one step. Dropping the transaction releases the guard
//! and throws the copy away.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;

use topup_core::{RuleId, WalletId};
use topup_state::{NewRule, NewWallet, RecurringTransactionRule, RulePatch, Wallet};

use crate::store::{RuleStore, RuleTransaction, StatusFilter, StoreError};

/// A wallet together with all of its rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub wallet: Wallet,
    #[serde(default)]
    pub recurring_transaction_rules: Vec<RecurringTransactionRule>,
}

#[derive(Debug, Default)]
struct Inner {
    wallets: RwLock<HashMap<WalletId, Wallet>>,
    rules: RwLock<HashMap<WalletId, Vec<RecurringTransactionRule>>>,
    locks: Mutex<HashMap<WalletId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Process-local rule store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleStore {
    inner: Arc<Inner>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a wallet and its rules, replacing whatever was stored for it.
    pub fn insert_snapshot(&self, snapshot: WalletSnapshot) -> Result<(), StoreError> {
        let wallet_id = snapshot.wallet.id;
        if let Some(stray) = snapshot
            .recurring_transaction_rules
            .iter()
            .find(|rule| rule.wallet_id != wallet_id)
        {
            return Err(StoreError::Backend(format!(
                "rule {} belongs to wallet {}, not {wallet_id}",
                stray.id, stray.wallet_id
            )));
        }
        self.inner
            .rules
            .write()
            .insert(wallet_id, snapshot.recurring_transaction_rules);
        self.inner.wallets.write().insert(wallet_id, snapshot.wallet);
        Ok(())
    }

    /// Build a store holding a single wallet.
    pub fn from_snapshot(snapshot: WalletSnapshot) -> Result<Self, StoreError> {
        let store = Self::new();
        store.insert_snapshot(snapshot)?;
        Ok(store)
    }

    /// The committed state of a wallet, terminated rules included.
    pub fn snapshot(&self, wallet_id: WalletId) -> Option<WalletSnapshot> {
        let wallet = self.inner.wallets.read().get(&wallet_id).cloned()?;
        let rules = self
            .inner
            .rules
            .read()
            .get(&wallet_id)
            .cloned()
            .unwrap_or_default();
        Some(WalletSnapshot {
            wallet,
            recurring_transaction_rules: rules,
        })
    }

    fn wallet_lock(&self, wallet_id: WalletId) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .locks
            .lock()
            .entry(wallet_id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn create_wallet(&self, new: NewWallet) -> Result<Wallet, StoreError> {
        let wallet = Wallet::create(new, Utc::now());
        self.inner.wallets.write().insert(wallet.id, wallet.clone());
        self.inner.rules.write().insert(wallet.id, Vec::new());
        Ok(wallet)
    }

    async fn get_wallet(&self, id: WalletId) -> Result<Wallet, StoreError> {
        self.inner
            .wallets
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::WalletNotFound(id))
    }

    async fn list_rules(
        &self,
        wallet_id: WalletId,
        filter: StatusFilter,
    ) -> Result<Vec<RecurringTransactionRule>, StoreError> {
        if !self.inner.wallets.read().contains_key(&wallet_id) {
            return Err(StoreError::WalletNotFound(wallet_id));
        }
        Ok(self
            .inner
            .rules
            .read()
            .get(&wallet_id)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|rule| filter.matches(rule.status))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn begin(
        &self,
        wallet_id: WalletId,
        lock_timeout: Duration,
    ) -> Result<Box<dyn RuleTransaction>, StoreError> {
        self.get_wallet(wallet_id).await?;

        let guard = tokio::time::timeout(lock_timeout, self.wallet_lock(wallet_id).lock_owned())
            .await
            .map_err(|_| StoreError::Conflict(wallet_id))?;

        // Read after locking so the working copy includes the previous commit.
        let wallet = self.get_wallet(wallet_id).await?;
        let rules = self
            .inner
            .rules
            .read()
            .get(&wallet_id)
            .cloned()
            .unwrap_or_default();

        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            wallet,
            rules,
            _guard: guard,
        }))
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    wallet: Wallet,
    rules: Vec<RecurringTransactionRule>,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn active_mut(&mut self, id: RuleId) -> Result<&mut RecurringTransactionRule, StoreError> {
        self.rules
            .iter_mut()
            .find(|rule| rule.id == id && rule.is_active())
            .ok_or(StoreError::RuleNotFound(id))
    }
}

#[async_trait]
impl RuleTransaction for MemoryTransaction {
    fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    async fn fetch_active_rules(&mut self) -> Result<Vec<RecurringTransactionRule>, StoreError> {
        Ok(self
            .rules
            .iter()
            .filter(|rule| rule.is_active())
            .cloned()
            .collect())
    }

    async fn create_rule(&mut self, new: NewRule) -> Result<RecurringTransactionRule, StoreError> {
        let rule = RecurringTransactionRule::create(RuleId::new(), self.wallet.id, new, Utc::now());
        self.rules.push(rule.clone());
        Ok(rule)
    }

    async fn update_rule(
        &mut self,
        id: RuleId,
        patch: &RulePatch,
    ) -> Result<RecurringTransactionRule, StoreError> {
        let rule = self.active_mut(id)?;
        rule.apply_patch(patch, Utc::now())
            .map_err(|_| StoreError::RuleNotFound(id))?;
        Ok(rule.clone())
    }

    async fn terminate_rule(&mut self, id: RuleId) -> Result<RecurringTransactionRule, StoreError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or(StoreError::RuleNotFound(id))?;
        rule.terminate(Utc::now());
        Ok(rule.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction {
            inner,
            wallet,
            rules,
            _guard,
        } = *self;
        inner.rules.write().insert(wallet.id, rules);
        drop(_guard);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
