//! # Postgres Rule Store
//!
//! [`RuleStore`] over the `wallets` / `recurring_transaction_rules` /
//! `audit_events` tables.
//!
//! A transaction is a Postgres transaction that starts by locking the
//! wallet row (`SELECT ... FOR UPDATE`) under a transaction-local
//! `lock_timeout`. Lock timeouts, serialization failures and deadlocks all
//! surface as [`StoreError::Conflict`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use topup_core::{RuleId, WalletId};
use topup_reconcile::{RuleStore, RuleTransaction, StatusFilter, StoreError};
use topup_state::{NewRule, NewWallet, RecurringTransactionRule, RulePatch, Wallet};

use super::audit::{self, AuditAction, AuditHead};
use super::{rules, wallets};

fn store_error(wallet_id: WalletId, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        // serialization_failure, deadlock_detected, lock_not_available
        if matches!(db.code().as_deref(), Some("40001" | "40P01" | "55P03")) {
            return StoreError::Conflict(wallet_id);
        }
    }
    tracing::error!(error = %err, wallet_id = %wallet_id, "rule store query failed");
    StoreError::Backend(err.to_string())
}

/// Postgres column precision is microseconds.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Postgres-backed rule store.
#[derive(Debug, Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn create_wallet(&self, new: NewWallet) -> Result<Wallet, StoreError> {
        let wallet = Wallet::create(new, now());
        wallets::insert(&self.pool, &wallet)
            .await
            .map_err(|e| store_error(wallet.id, e))?;
        Ok(wallet)
    }

    async fn get_wallet(&self, id: WalletId) -> Result<Wallet, StoreError> {
        wallets::fetch(&self.pool, id)
            .await
            .map_err(|e| store_error(id, e))?
            .ok_or(StoreError::WalletNotFound(id))
    }

    async fn list_rules(
        &self,
        wallet_id: WalletId,
        filter: StatusFilter,
    ) -> Result<Vec<RecurringTransactionRule>, StoreError> {
        self.get_wallet(wallet_id).await?;
        rules::list(&self.pool, wallet_id, filter)
            .await
            .map_err(|e| store_error(wallet_id, e))
    }

    async fn begin(
        &self,
        wallet_id: WalletId,
        lock_timeout: Duration,
    ) -> Result<Box<dyn RuleTransaction>, StoreError> {
        let err = |e: sqlx::Error| store_error(wallet_id, e);

        let mut tx = self.pool.begin().await.map_err(err)?;

        // Transaction-local; reverts at commit or rollback.
        let timeout = format!("{}ms", lock_timeout.as_millis().max(1));
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(&timeout)
            .execute(&mut *tx)
            .await
            .map_err(err)?;

        let wallet = wallets::fetch_for_update(&mut *tx, wallet_id)
            .await
            .map_err(err)?
            .ok_or(StoreError::WalletNotFound(wallet_id))?;
        let head = audit::head(&mut *tx, wallet_id).await.map_err(err)?;

        tracing::debug!(wallet_id = %wallet_id, audit_sequence = head.sequence, "wallet locked");

        Ok(Box::new(PgRuleTransaction { tx, wallet, head }))
    }
}

/// A reconciliation's Postgres transaction, holding the wallet row lock.
pub struct PgRuleTransaction {
    tx: Transaction<'static, Postgres>,
    wallet: Wallet,
    head: AuditHead,
}

impl PgRuleTransaction {
    fn err(&self, e: sqlx::Error) -> StoreError {
        store_error(self.wallet.id, e)
    }

    async fn record(
        &mut self,
        rule: &RecurringTransactionRule,
        action: AuditAction,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_value(rule)
            .map_err(|e| StoreError::Backend(format!("audit payload: {e}")))?;
        let wallet_id = self.wallet.id;
        audit::append(
            &mut *self.tx,
            &mut self.head,
            wallet_id,
            Some(rule.id),
            action,
            &payload,
        )
        .await
        .map_err(|e| store_error(wallet_id, e))?;
        Ok(())
    }

    async fn locked_rule(&mut self, id: RuleId) -> Result<RecurringTransactionRule, StoreError> {
        let wallet_id = self.wallet.id;
        rules::fetch_for_update(&mut *self.tx, wallet_id, id)
            .await
            .map_err(|e| store_error(wallet_id, e))?
            .ok_or(StoreError::RuleNotFound(id))
    }

    async fn write(&mut self, rule: &RecurringTransactionRule) -> Result<(), StoreError> {
        let updated = rules::update(&mut *self.tx, rule)
            .await
            .map_err(|e| self.err(e))?;
        if !updated {
            return Err(StoreError::RuleNotFound(rule.id));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleTransaction for PgRuleTransaction {
    fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    async fn fetch_active_rules(&mut self) -> Result<Vec<RecurringTransactionRule>, StoreError> {
        let wallet_id = self.wallet.id;
        rules::active_for_update(&mut *self.tx, wallet_id)
            .await
            .map_err(|e| store_error(wallet_id, e))
    }

    async fn create_rule(&mut self, new: NewRule) -> Result<RecurringTransactionRule, StoreError> {
        let rule = RecurringTransactionRule::create(RuleId::new(), self.wallet.id, new, now());
        rules::insert(&mut *self.tx, &rule)
            .await
            .map_err(|e| self.err(e))?;
        self.record(&rule, AuditAction::RuleCreated).await?;
        Ok(rule)
    }

    async fn update_rule(
        &mut self,
        id: RuleId,
        patch: &RulePatch,
    ) -> Result<RecurringTransactionRule, StoreError> {
        let mut rule = self.locked_rule(id).await?;
        let changed = rule
            .apply_patch(patch, now())
            .map_err(|_| StoreError::RuleNotFound(id))?;
        if changed {
            self.write(&rule).await?;
            self.record(&rule, AuditAction::RuleUpdated).await?;
        }
        Ok(rule)
    }

    async fn terminate_rule(&mut self, id: RuleId) -> Result<RecurringTransactionRule, StoreError> {
        let mut rule = self.locked_rule(id).await?;
        if rule.terminate(now()) {
            self.write(&rule).await?;
            self.record(&rule, AuditAction::RuleTerminated).await?;
        }
        Ok(rule)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let wallet_id = self.wallet.id;
        self.tx
            .commit()
            .await
            .map_err(|e| store_error(wallet_id, e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let wallet_id = self.wallet.id;
        self.tx
            .rollback()
            .await
            .map_err(|e| store_error(wallet_id, e))
    }
}
