//! # Reconciliation Planning
//!
//! Pure computation of what a reconciliation pass will do, given the wallet,
//! its active rules and the incoming specs. Nothing here touches storage, so
//! every validation failure surfaces before the first write.
//!
//! ```text
//! specs ─┬─ identity found among active ──▶ update (verbatim patch)
//!        ├─ identity not found ───────────▶ create, or reject (strict)
//!        └─ no identity ──────────────────▶ create (wallet defaults)
//!
//! orphans = previous active ids \ retained ids
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use topup_core::{RuleId, TopupError, ValidationError};
use topup_state::{NewRule, RecurringTransactionRule, RulePatch, Wallet};

use crate::policy::resolve_creation;
use crate::spec::RuleSpec;
use crate::validate::{validate_effective, validate_request};

/// What to do with a spec whose identity matches no active rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedIdentity {
    /// Treat the spec as a new rule.
    #[default]
    Create,
    /// Fail the pass with `RuleNotFound`.
    Reject,
}

impl UnresolvedIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Reject => "reject",
        }
    }
}

impl std::str::FromStr for UnresolvedIdentity {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "reject" => Ok(Self::Reject),
            other => Err(TopupError::UnknownVariant {
                kind: "unresolved identity policy",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for UnresolvedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a plan could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Strict policy: the identity matched no active rule.
    #[error("recurring_transaction_rules[{index}]: no active rule with identity {identity:?}")]
    UnresolvedIdentity { index: usize, identity: String },
}

/// An in-place update of an active rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    /// Position of the spec in the request.
    pub index: usize,
    pub rule_id: RuleId,
    pub patch: RulePatch,
}

/// A rule to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCreate {
    /// Position of the spec in the request.
    pub index: usize,
    pub new_rule: NewRule,
    /// The caller sent an identity that matched nothing.
    pub downgraded_identity: Option<String>,
}

/// The full set of actions for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub updates: Vec<PlannedUpdate>,
    pub creates: Vec<PlannedCreate>,
    /// Active rules no spec references, in creation order.
    pub orphans: Vec<RecurringTransactionRule>,
}

impl Plan {
    /// Whether the pass would change anything beyond rewriting matched rules.
    pub fn is_structural_noop(&self) -> bool {
        self.creates.is_empty() && self.orphans.is_empty()
    }
}

/// Match `specs` against `active` and validate every resulting rule.
///
/// `now` only stamps the preview records used for validation.
pub fn plan(
    wallet: &Wallet,
    active: &[RecurringTransactionRule],
    specs: &[RuleSpec],
    unresolved: UnresolvedIdentity,
    now: DateTime<Utc>,
) -> Result<Plan, PlanError> {
    validate_request(specs)?;

    let by_id: HashMap<RuleId, &RecurringTransactionRule> =
        active.iter().map(|rule| (rule.id, rule)).collect();

    let mut plan = Plan::default();
    let mut retained: HashSet<RuleId> = HashSet::with_capacity(specs.len());

    for (index, spec) in specs.iter().enumerate() {
        let matched = spec.rule_id().and_then(|id| by_id.get(&id).copied());

        if let Some(existing) = matched {
            let patch = spec.to_patch();
            validate_effective(index, spec, &existing.patched(&patch))?;
            retained.insert(existing.id);
            plan.updates.push(PlannedUpdate {
                index,
                rule_id: existing.id,
                patch,
            });
            continue;
        }

        let downgraded_identity = spec.identity().map(str::to_string);
        if let (Some(identity), UnresolvedIdentity::Reject) = (&downgraded_identity, unresolved) {
            return Err(PlanError::UnresolvedIdentity {
                index,
                identity: identity.clone(),
            });
        }

        let resolved = resolve_creation(spec, wallet);
        let new_rule = resolved
            .to_new_rule()
            .ok_or_else(|| ValidationError::new(index, "trigger", "is required"))?;
        let preview =
            RecurringTransactionRule::create(RuleId::new(), wallet.id, new_rule.clone(), now);
        validate_effective(index, spec, &preview)?;

        plan.creates.push(PlannedCreate {
            index,
            new_rule,
            downgraded_identity,
        });
    }

    let previous: HashSet<RuleId> = by_id.keys().copied().collect();
    let orphan_ids: HashSet<RuleId> = previous.difference(&retained).copied().collect();
    plan.orphans = active
        .iter()
        .filter(|rule| orphan_ids.contains(&rule.id))
        .cloned()
        .collect();

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use topup_core::{Credits, Decimal, Interval, Method, Trigger};
    use topup_state::NewWallet;

    fn wallet(flag: bool) -> Wallet {
        Wallet::create(
            NewWallet {
                name: Some("main".into()),
                invoice_requires_successful_payment: flag,
            },
            Utc::now(),
        )
    }

    fn active_rule(wallet: &Wallet) -> RecurringTransactionRule {
        RecurringTransactionRule::create(
            RuleId::new(),
            wallet.id,
            NewRule {
                trigger: Trigger::Threshold,
                interval: None,
                threshold_credits: Some("1.0".parse().unwrap()),
                method: None,
                paid_credits: None,
                granted_credits: None,
                target_ongoing_balance: None,
                started_at: None,
                expiration_at: None,
                invoice_requires_successful_payment: false,
                transaction_metadata: None,
            },
            Utc::now(),
        )
    }

    fn threshold_spec() -> RuleSpec {
        RuleSpec {
            trigger: Some(Trigger::Threshold),
            threshold_credits: Some("5".parse().unwrap()),
            ..RuleSpec::default()
        }
    }

    fn referencing(rule: &RecurringTransactionRule) -> RuleSpec {
        RuleSpec {
            identity: Some(rule.id.to_string()),
            ..RuleSpec::default()
        }
    }

    #[test]
    fn mixed_pass() {
        let w = wallet(false);
        let (a, b) = (active_rule(&w), active_rule(&w));
        let specs = vec![referencing(&a), threshold_spec()];

        let plan = plan(&w, &[a.clone(), b.clone()], &specs, Default::default(), Utc::now())
            .unwrap();

        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].rule_id, a.id);
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.creates[0].index, 1);
        assert_eq!(plan.orphans, vec![b]);
    }

    #[test]
    fn empty_specs_orphan_everything() {
        let w = wallet(false);
        let active = vec![active_rule(&w), active_rule(&w)];
        let plan = plan(&w, &active, &[], Default::default(), Utc::now()).unwrap();
        assert_eq!(plan.orphans, active);
        assert!(plan.updates.is_empty() && plan.creates.is_empty());
    }

    #[test]
    fn update_patch_is_verbatim() {
        let w = wallet(true);
        let a = active_rule(&w);
        let plan = plan(&w, &[a.clone()], &[referencing(&a)], Default::default(), Utc::now())
            .unwrap();
        // No wallet default injected into updates.
        assert_eq!(plan.updates[0].patch, RulePatch::default());
        assert!(plan.is_structural_noop());
    }

    #[test]
    fn creation_inherits_wallet_flag() {
        let w = wallet(true);
        let plan = plan(&w, &[], &[threshold_spec()], Default::default(), Utc::now()).unwrap();
        assert!(plan.creates[0].new_rule.invoice_requires_successful_payment);
    }

    #[test]
    fn unresolved_identity_downgrades_to_creation() {
        let w = wallet(false);
        let spec = RuleSpec {
            identity: Some(RuleId::new().to_string()),
            ..threshold_spec()
        };
        let plan = plan(&w, &[], &[spec.clone()], UnresolvedIdentity::Create, Utc::now()).unwrap();
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(
            plan.creates[0].downgraded_identity.as_deref(),
            spec.identity()
        );
    }

    #[test]
    fn unresolved_identity_rejected_under_strict_policy() {
        let w = wallet(false);
        let spec = RuleSpec {
            identity: Some("ghost".into()),
            ..threshold_spec()
        };
        let err = plan(&w, &[], &[spec], UnresolvedIdentity::Reject, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            PlanError::UnresolvedIdentity {
                index: 0,
                identity: "ghost".into()
            }
        );
    }

    #[test]
    fn identity_of_terminated_rule_does_not_match() {
        let w = wallet(false);
        let mut gone = active_rule(&w);
        gone.terminate(Utc::now());
        let spec = RuleSpec {
            identity: Some(gone.id.to_string()),
            ..threshold_spec()
        };
        // Only active rules are passed in; the terminated one is invisible.
        let plan = plan(&w, &[], &[spec], Default::default(), Utc::now()).unwrap();
        assert_eq!(plan.creates.len(), 1);
    }

    #[test]
    fn creation_without_trigger_is_invalid() {
        let w = wallet(false);
        let err = plan(&w, &[], &[RuleSpec::default()], Default::default(), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::Validation(ValidationError::new(0, "trigger", "is required"))
        );
    }

    #[test]
    fn update_validates_merged_rule() {
        let w = wallet(false);
        let a = active_rule(&w);
        let spec = RuleSpec {
            method: Some(Method::Target),
            ..referencing(&a)
        };
        let err = plan(&w, &[a.clone()], &[spec], Default::default(), Utc::now()).unwrap_err();
        match err {
            PlanError::Validation(v) => assert_eq!(v.field, "target_ongoing_balance"),
            other => panic!("unexpected {other:?}"),
        }

        let with_target = RuleSpec {
            method: Some(Method::Target),
            target_ongoing_balance: Some(Some(Decimal::new(200, 0))),
            ..referencing(&a)
        };
        assert!(plan(&w, &[a], &[with_target], Default::default(), Utc::now()).is_ok());
    }

    #[test]
    fn interval_creation_requires_interval() {
        let w = wallet(false);
        let spec = RuleSpec {
            trigger: Some(Trigger::Interval),
            ..RuleSpec::default()
        };
        let err = plan(&w, &[], &[spec.clone()], Default::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, PlanError::Validation(ref v) if v.field == "interval"));

        let ok = RuleSpec {
            interval: Some(Some(Interval::Monthly)),
            paid_credits: Some(Credits::ZERO),
            ..spec
        };
        assert!(plan(&w, &[], &[ok], Default::default(), Utc::now()).is_ok());
    }

    #[test]
    fn policy_parses() {
        assert_eq!(
            "reject".parse::<UnresolvedIdentity>().unwrap(),
            UnresolvedIdentity::Reject
        );
        assert!("ignore".parse::<UnresolvedIdentity>().is_err());
    }
}
