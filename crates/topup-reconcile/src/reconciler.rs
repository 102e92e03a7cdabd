//! # Reconciler
//!
//! Brings a wallet's active rules in line with a caller's rule list in one
//! atomic pass:
//!
//! 1. Open a wallet-scoped transaction and read the active rules.
//! 2. Plan: match, resolve defaults, validate. No writes yet.
//! 3. Apply updates, then creates, then terminations of orphans.
//! 4. Commit, or roll back on the first failure.
//!
//! The reconciler keeps no state between calls. Dropping the returned future
//! before it completes drops the transaction, which applies nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use topup_core::{RuleId, ValidationError, WalletId};

use crate::counters;
use crate::plan::{plan, PlanError, UnresolvedIdentity};
use crate::spec::RuleSpec;
use crate::store::{RuleStore, RuleTransaction, StoreError, Terminator};

/// Default wait for a wallet held by another reconciliation.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Reconciliation failure. Nothing is persisted when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An update target vanished, or an identity went unresolved under the
    /// strict policy.
    #[error("recurring transaction rule {identity:?} not found")]
    RuleNotFound { identity: String },

    /// Another reconciliation holds the wallet. Safe to retry.
    #[error("wallet {0} is being reconciled concurrently")]
    ConcurrencyConflict(WalletId),

    /// The store or terminator failed. Safe to retry.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl ReconcileError {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::WalletNotFound(_) => "wallet_not_found",
            Self::Validation(_) => "validation",
            Self::RuleNotFound { .. } => "rule_not_found",
            Self::ConcurrencyConflict(_) => "concurrency_conflict",
            Self::Collaborator(_) => "collaborator",
        }
    }
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WalletNotFound(id) => Self::WalletNotFound(id),
            StoreError::RuleNotFound(id) => Self::RuleNotFound {
                identity: id.to_string(),
            },
            StoreError::Conflict(id) => Self::ConcurrencyConflict(id),
            StoreError::Backend(msg) => Self::Collaborator(msg),
        }
    }
}

impl From<PlanError> for ReconcileError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Validation(v) => Self::Validation(v),
            PlanError::UnresolvedIdentity { identity, .. } => Self::RuleNotFound { identity },
        }
    }
}

/// Reconciler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub unresolved_identity: UnresolvedIdentity,
    pub lock_timeout: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            unresolved_identity: UnresolvedIdentity::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub wallet_id: WalletId,
    /// One id per incoming spec, in request order.
    pub applied_rule_ids: Vec<RuleId>,
    pub created: Vec<RuleId>,
    pub updated: Vec<RuleId>,
    pub terminated: Vec<RuleId>,
}

/// Applies rule lists to wallets.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RuleStore>,
    terminator: Arc<dyn Terminator>,
    config: ReconcileConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RuleStore>,
        terminator: Arc<dyn Terminator>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            terminator,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Make the wallet's active rules match `specs`.
    #[tracing::instrument(skip_all, fields(wallet_id = %wallet_id, specs = specs.len()))]
    pub async fn reconcile(
        &self,
        wallet_id: WalletId,
        specs: &[RuleSpec],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let result = self.run(wallet_id, specs).await;
        match &result {
            Ok(outcome) => {
                counters::record_outcome(outcome);
                info!(
                    created = outcome.created.len(),
                    updated = outcome.updated.len(),
                    terminated = outcome.terminated.len(),
                    "reconciled recurring transaction rules"
                );
            }
            Err(err) => {
                counters::record_failure(err);
                warn!(reason = err.reason(), error = %err, "reconciliation failed");
            }
        }
        result
    }

    async fn run(
        &self,
        wallet_id: WalletId,
        specs: &[RuleSpec],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut tx = self.store.begin(wallet_id, self.config.lock_timeout).await?;

        let applied = self.apply(tx.as_mut(), specs).await;
        match applied {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut dyn RuleTransaction,
        specs: &[RuleSpec],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let wallet = tx.wallet().clone();
        let active = tx.fetch_active_rules().await?;
        let plan = plan(
            &wallet,
            &active,
            specs,
            self.config.unresolved_identity,
            Utc::now(),
        )?;

        let mut applied: Vec<Option<RuleId>> = vec![None; specs.len()];
        let mut outcome = ReconcileOutcome {
            wallet_id: wallet.id,
            applied_rule_ids: Vec::with_capacity(specs.len()),
            created: Vec::with_capacity(plan.creates.len()),
            updated: Vec::with_capacity(plan.updates.len()),
            terminated: Vec::with_capacity(plan.orphans.len()),
        };

        for update in &plan.updates {
            let rule = tx.update_rule(update.rule_id, &update.patch).await?;
            debug!(rule_id = %rule.id, index = update.index, "updated rule");
            applied[update.index] = Some(rule.id);
            outcome.updated.push(rule.id);
        }

        for create in plan.creates {
            let rule = tx.create_rule(create.new_rule).await?;
            match &create.downgraded_identity {
                Some(identity) => debug!(
                    rule_id = %rule.id,
                    index = create.index,
                    unresolved = %identity,
                    "created rule for unresolved identity"
                ),
                None => debug!(rule_id = %rule.id, index = create.index, "created rule"),
            }
            applied[create.index] = Some(rule.id);
            outcome.created.push(rule.id);
        }

        for orphan in &plan.orphans {
            self.terminator
                .terminate(tx, orphan)
                .await
                .map_err(|err| match err {
                    StoreError::Backend(msg) => {
                        ReconcileError::Collaborator(format!("terminating rule {}: {msg}", orphan.id))
                    }
                    other => other.into(),
                })?;
            debug!(rule_id = %orphan.id, "terminated rule");
            outcome.terminated.push(orphan.id);
        }

        outcome.applied_rule_ids = applied.into_iter().flatten().collect();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRuleStore;
    use crate::store::LifecycleTerminator;

    #[test]
    fn store_errors_map_to_reconcile_errors() {
        let w = WalletId::new();
        assert_eq!(
            ReconcileError::from(StoreError::Conflict(w)),
            ReconcileError::ConcurrencyConflict(w)
        );
        assert_eq!(
            ReconcileError::from(StoreError::Backend("boom".into())).reason(),
            "collaborator"
        );
    }

    #[test]
    fn strict_policy_failure_maps_to_rule_not_found() {
        let err = ReconcileError::from(PlanError::UnresolvedIdentity {
            index: 4,
            identity: "ghost".into(),
        });
        assert_eq!(
            err,
            ReconcileError::RuleNotFound {
                identity: "ghost".into()
            }
        );
    }

    #[tokio::test]
    async fn unknown_wallet() {
        let reconciler = Reconciler::new(
            Arc::new(InMemoryRuleStore::new()),
            Arc::new(LifecycleTerminator),
            ReconcileConfig::default(),
        );
        let id = WalletId::new();
        let err = reconciler.reconcile(id, &[]).await.unwrap_err();
        assert_eq!(err, ReconcileError::WalletNotFound(id));
    }

    #[test]
    fn default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.unresolved_identity, UnresolvedIdentity::Create);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
    }
}
