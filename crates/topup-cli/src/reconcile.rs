//! # Reconcile Subcommand
//!
//! Runs a real reconciliation pass over a wallet snapshot file using the
//! in-memory store and the lifecycle terminator, then prints the outcome
//! and the resulting snapshot.
//!
//! The snapshot file is the JSON form of [`WalletSnapshot`]. It is read,
//! never modified in place; pass `--output` to write the result elsewhere.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use topup_reconcile::{
    InMemoryRuleStore, LifecycleTerminator, ReconcileConfig, ReconcileOutcome, Reconciler,
    RuleSpec, UnresolvedIdentity, WalletSnapshot,
};

/// Arguments for the `topup reconcile` subcommand.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Wallet snapshot (JSON): the wallet and its current rules.
    #[arg(long, value_name = "PATH")]
    pub snapshot: PathBuf,

    /// Desired rule list (JSON or YAML).
    #[arg(long, value_name = "PATH")]
    pub specs: PathBuf,

    /// Write the resulting snapshot here instead of printing it.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Fail when an identity matches no active rule instead of creating one.
    #[arg(long)]
    pub reject_unresolved: bool,
}

/// Printed result of a successful pass.
#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<WalletSnapshot>,
}

/// Execute the reconcile subcommand.
///
/// Returns exit code: 0 on success, 1 when the pass was rejected.
pub fn run_reconcile(args: &ReconcileArgs) -> Result<u8> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let specs = crate::load_specs(&args.specs)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(reconcile_snapshot(
        snapshot,
        &specs,
        config_for(args.reject_unresolved),
    ))?;

    let (outcome, after) = match result {
        Ok(pair) => pair,
        Err(err) => {
            println!("FAIL: {err}");
            return Ok(1);
        }
    };

    let report = match &args.output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&after)?;
            std::fs::write(path, json + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote resulting snapshot");
            ReconcileReport {
                outcome,
                snapshot: None,
            }
        }
        None => ReconcileReport {
            outcome,
            snapshot: Some(after),
        },
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

fn config_for(reject_unresolved: bool) -> ReconcileConfig {
    let unresolved_identity = if reject_unresolved {
        UnresolvedIdentity::Reject
    } else {
        UnresolvedIdentity::Create
    };
    ReconcileConfig {
        unresolved_identity,
        ..ReconcileConfig::default()
    }
}

/// Read a wallet snapshot file.
pub fn load_snapshot(path: &Path) -> Result<WalletSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{}: invalid wallet snapshot", path.display()))
}

/// Reconcile `specs` against `snapshot`.
///
/// The outer error covers an unusable snapshot. The inner one is a rejected
/// pass, in which case the snapshot is unchanged.
pub async fn reconcile_snapshot(
    snapshot: WalletSnapshot,
    specs: &[RuleSpec],
    config: ReconcileConfig,
) -> Result<Result<(ReconcileOutcome, WalletSnapshot), topup_reconcile::ReconcileError>> {
    let wallet_id = snapshot.wallet.id;
    let store = Arc::new(InMemoryRuleStore::from_snapshot(snapshot)?);
    let reconciler = Reconciler::new(store.clone(), Arc::new(LifecycleTerminator), config);

    let outcome = match reconciler.reconcile(wallet_id, specs).await {
        Ok(outcome) => outcome,
        Err(err) => return Ok(Err(err)),
    };
    let after = store
        .snapshot(wallet_id)
        .context("wallet vanished from the store")?;
    Ok(Ok((outcome, after)))
}
