//! # Validation
//!
//! Two passes, both before anything is written:
//!
//! 1. [`validate_request`] looks at the list alone: duplicate identities,
//!    blank metadata keys, and date ranges the spec fully determines.
//! 2. [`validate_effective`] looks at each rule as it would be persisted,
//!    after the spec is merged onto the stored rule (or onto persistence
//!    defaults for a creation).
//!
//! Both report the first failure with the spec's position in the list.

use std::collections::HashMap;

use topup_core::{Method, ValidationError};
use topup_state::RecurringTransactionRule;

use crate::spec::RuleSpec;

/// Static checks over the whole request.
pub fn validate_request(specs: &[RuleSpec]) -> Result<(), ValidationError> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (index, spec) in specs.iter().enumerate() {
        if let Some(identity) = spec.identity() {
            // Compare UUIDs in canonical form so case differences still collide.
            let key = spec
                .rule_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| identity.to_string());
            if let Some(first) = seen.insert(key, index) {
                return Err(ValidationError::new(
                    index,
                    "lago_id",
                    format!("duplicates the identity of recurring_transaction_rules[{first}]"),
                ));
            }
        }

        if let Some(metadata) = &spec.transaction_metadata {
            if let Some(pos) = metadata.iter().position(|e| e.key.trim().is_empty()) {
                return Err(ValidationError::new(
                    index,
                    "transaction_metadata",
                    format!("entry {pos} has an empty key"),
                ));
            }
        }

        if let (Some(Some(start)), Some(Some(end))) = (spec.started_at, spec.expiration_at) {
            if end <= start {
                return Err(ValidationError::new(
                    index,
                    "expiration_at",
                    "must be after started_at",
                ));
            }
        }
    }
    Ok(())
}

/// Checks on the rule `spec` would produce.
pub fn validate_effective(
    index: usize,
    spec: &RuleSpec,
    effective: &RecurringTransactionRule,
) -> Result<(), ValidationError> {
    if effective.method == Method::Fixed && matches!(spec.target_ongoing_balance, Some(Some(_))) {
        return Err(ValidationError::new(
            index,
            "target_ongoing_balance",
            "cannot be set when method is fixed",
        ));
    }
    effective
        .check()
        .map_err(|v| ValidationError::new(index, v.field, v.reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use topup_core::{Decimal, MetadataEntry, RuleId, Trigger, WalletId};
    use topup_state::NewRule;

    fn spec_with_identity(identity: &str) -> RuleSpec {
        RuleSpec {
            identity: Some(identity.into()),
            ..RuleSpec::default()
        }
    }

    #[test]
    fn empty_request_is_valid() {
        assert!(validate_request(&[]).is_ok());
    }

    #[test]
    fn duplicate_identity_is_rejected_at_second_occurrence() {
        let id = RuleId::new().to_string();
        let specs = vec![
            spec_with_identity(&id),
            RuleSpec::default(),
            spec_with_identity(&id.to_uppercase()),
        ];
        let err = validate_request(&specs).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.field, "lago_id");
        assert!(err.reason.contains("[0]"));
    }

    #[test]
    fn distinct_identities_pass() {
        let specs = vec![
            spec_with_identity(&RuleId::new().to_string()),
            spec_with_identity(&RuleId::new().to_string()),
            spec_with_identity("not-a-uuid"),
        ];
        assert!(validate_request(&specs).is_ok());
    }

    #[test]
    fn blank_metadata_key_is_rejected() {
        let specs = vec![RuleSpec {
            transaction_metadata: Some(vec![MetadataEntry::new("", "v")]),
            ..RuleSpec::default()
        }];
        let err = validate_request(&specs).unwrap_err();
        assert_eq!((err.index, err.field), (0, "transaction_metadata"));
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let now = Utc::now();
        let specs = vec![RuleSpec {
            started_at: Some(Some(now)),
            expiration_at: Some(Some(now - Duration::days(1))),
            ..RuleSpec::default()
        }];
        assert_eq!(validate_request(&specs).unwrap_err().field, "expiration_at");
    }

    fn effective(trigger: Trigger, method: Option<Method>) -> RecurringTransactionRule {
        RecurringTransactionRule::create(
            RuleId::new(),
            WalletId::new(),
            NewRule {
                trigger,
                interval: None,
                threshold_credits: None,
                method,
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

    #[test]
    fn fixed_method_with_explicit_target_conflicts() {
        let spec = RuleSpec {
            target_ongoing_balance: Some(Some(Decimal::new(50, 0))),
            ..RuleSpec::default()
        };
        let err = validate_effective(3, &spec, &effective(Trigger::Threshold, None)).unwrap_err();
        assert_eq!(err.index, 3);
        assert_eq!(err.field, "target_ongoing_balance");
    }

    #[test]
    fn structural_violation_carries_index() {
        let err = validate_effective(1, &RuleSpec::default(), &effective(Trigger::Interval, None))
            .unwrap_err();
        assert_eq!((err.index, err.field), (1, "interval"));
    }
}
