//! # Default Resolution Policy
//!
//! Fills in what a creation candidate inherits from its wallet. Only
//! `invoice_requires_successful_payment` is inherited; every other omitted
//! field stays absent and picks up its persistence default when the rule is
//! built. The policy never invents a trigger, interval, method or amount.
//!
//! Updates never go through this policy.

use topup_state::Wallet;

use crate::spec::RuleSpec;

/// Return `spec` with wallet-inherited fields filled in.
pub fn resolve_creation(spec: &RuleSpec, wallet: &Wallet) -> RuleSpec {
    let mut resolved = spec.clone();
    resolved
        .invoice_requires_successful_payment
        .get_or_insert(wallet.invoice_requires_successful_payment);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use topup_core::Trigger;
    use topup_state::NewWallet;

    fn wallet(flag: bool) -> Wallet {
        Wallet::create(
            NewWallet {
                name: None,
                invoice_requires_successful_payment: flag,
            },
            Utc::now(),
        )
    }

    #[test]
    fn inherits_wallet_flag_when_omitted() {
        let spec = RuleSpec {
            trigger: Some(Trigger::Threshold),
            ..RuleSpec::default()
        };
        let resolved = resolve_creation(&spec, &wallet(true));
        assert_eq!(resolved.invoice_requires_successful_payment, Some(true));
    }

    #[test]
    fn explicit_flag_wins() {
        let spec = RuleSpec {
            trigger: Some(Trigger::Threshold),
            invoice_requires_successful_payment: Some(false),
            ..RuleSpec::default()
        };
        let resolved = resolve_creation(&spec, &wallet(true));
        assert_eq!(resolved.invoice_requires_successful_payment, Some(false));
    }

    #[test]
    fn leaves_everything_else_alone() {
        let spec = RuleSpec::default();
        let resolved = resolve_creation(&spec, &wallet(false));
        assert_eq!(
            resolved,
            RuleSpec {
                invoice_requires_successful_payment: Some(false),
                ..RuleSpec::default()
            }
        );
    }

    #[test]
    fn deterministic() {
        let w = wallet(true);
        let spec = RuleSpec::default();
        assert_eq!(resolve_creation(&spec, &w), resolve_creation(&spec, &w));
    }
}
