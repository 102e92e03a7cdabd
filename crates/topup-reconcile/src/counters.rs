//! Reconciliation counters.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host process installs a recorder.

use crate::reconciler::{ReconcileError, ReconcileOutcome};

pub const RULES_CREATED: &str = "topup_rules_created_total";
pub const RULES_UPDATED: &str = "topup_rules_updated_total";
pub const RULES_TERMINATED: &str = "topup_rules_terminated_total";
pub const RECONCILE_FAILURES: &str = "topup_reconcile_failures_total";

pub(crate) fn record_outcome(outcome: &ReconcileOutcome) {
    metrics::counter!(RULES_CREATED).increment(outcome.created.len() as u64);
    metrics::counter!(RULES_UPDATED).increment(outcome.updated.len() as u64);
    metrics::counter!(RULES_TERMINATED).increment(outcome.terminated.len() as u64);
}

pub(crate) fn record_failure(err: &ReconcileError) {
    metrics::counter!(RECONCILE_FAILURES, "reason" => err.reason()).increment(1);
}
