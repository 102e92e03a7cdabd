//! # Validate Subcommand
//!
//! Static checks over a rule spec file, without a wallet.
//!
//! Request-level checks (duplicate identities, metadata keys, date ordering)
//! run over the whole file. Specs without an identity are creations, so the
//! rule they would produce is built and checked as well. Specs with an
//! identity are updates whose final shape depends on the stored rule; those
//! are only checked when reconciled.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use topup_core::{RuleId, ValidationError, WalletId};
use topup_reconcile::{validate, RuleSpec};
use topup_state::RecurringTransactionRule;

/// Arguments for the `topup validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Rule spec file (JSON or YAML).
    #[arg(long, value_name = "PATH")]
    pub specs: PathBuf,
}

/// Summary of a validation run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub creations: usize,
    pub updates: usize,
    pub failures: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 when every spec passes, 1 otherwise.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let specs = crate::load_specs(&args.specs)?;
    tracing::info!(path = %args.specs.display(), count = specs.len(), "loaded rule specs");

    let report = check_specs(&specs);

    println!(
        "Specs: {} total, {} creation(s), {} update(s)",
        specs.len(),
        report.creations,
        report.updates
    );
    for failure in &report.failures {
        println!("  FAIL: {failure}");
    }

    if report.passed() {
        println!("OK");
        Ok(0)
    } else {
        println!("\n{} spec(s) failed validation.", report.failures.len());
        Ok(1)
    }
}

/// Run every check that does not need stored state.
pub fn check_specs(specs: &[RuleSpec]) -> ValidationReport {
    let mut report = ValidationReport::default();

    if let Err(err) = validate::validate_request(specs) {
        report.failures.push(err.to_string());
    }

    for (index, spec) in specs.iter().enumerate() {
        if spec.identity().is_some() {
            report.updates += 1;
            continue;
        }
        report.creations += 1;
        if let Err(err) = check_creation(index, spec) {
            report.failures.push(err.to_string());
        }
    }

    report
}

fn check_creation(index: usize, spec: &RuleSpec) -> Result<(), ValidationError> {
    let Some(new) = spec.to_new_rule() else {
        return Err(ValidationError::new(
            index,
            "trigger",
            "is required when creating a rule",
        ));
    };
    let rule = RecurringTransactionRule::create(RuleId::new(), WalletId::new(), new, Utc::now());
    validate::validate_effective(index, spec, &rule)
}
