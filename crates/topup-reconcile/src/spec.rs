//! # Rule Specifications
//!
//! A [`RuleSpec`] is one entry of the declarative list a caller sends. It
//! either references an existing rule by `identity` (wire alias `lago_id`) or
//! describes a rule to create.
//!
//! Every field is optional on the wire. Absent fields leave stored values
//! untouched on update; nullable fields sent as `null` clear the stored value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use topup_core::{nullable, Credits, Decimal, Interval, MetadataEntry, Method, RuleId, Trigger};
use topup_state::{NewRule, RulePatch};

/// A desired rule, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Identity of an existing rule to update.
    #[serde(default, alias = "lago_id", skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(
        default,
        deserialize_with = "nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<Option<Interval>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_credits: Option<Credits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_credits: Option<Credits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_credits: Option<Credits>,
    #[serde(
        default,
        deserialize_with = "nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_ongoing_balance: Option<Option<Decimal>>,
    #[serde(
        default,
        deserialize_with = "nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_requires_successful_payment: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_metadata: Option<Vec<MetadataEntry>>,
}

impl RuleSpec {
    /// The caller-supplied identity, if any.
    ///
    /// Blank strings count as no identity.
    pub fn identity(&self) -> Option<&str> {
        self.identity
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
    }

    /// The identity as a rule id, when it is one.
    pub fn rule_id(&self) -> Option<RuleId> {
        self.identity().and_then(RuleId::resolve)
    }

    /// Present fields as an update, copied verbatim.
    pub fn to_patch(&self) -> RulePatch {
        RulePatch {
            trigger: self.trigger,
            interval: self.interval,
            threshold_credits: self.threshold_credits,
            method: self.method,
            paid_credits: self.paid_credits,
            granted_credits: self.granted_credits,
            target_ongoing_balance: self.target_ongoing_balance,
            started_at: self.started_at,
            expiration_at: self.expiration_at,
            invoice_requires_successful_payment: self.invoice_requires_successful_payment,
            transaction_metadata: self.transaction_metadata.clone(),
        }
    }

    /// Creation input for this spec.
    ///
    /// `None` when the spec has no trigger. An omitted invoice flag becomes
    /// `false` here; run the spec through
    /// [`resolve_creation`](crate::policy::resolve_creation) first to inherit
    /// the wallet's value instead.
    pub fn to_new_rule(&self) -> Option<NewRule> {
        Some(NewRule {
            trigger: self.trigger?,
            interval: self.interval.flatten(),
            threshold_credits: self.threshold_credits,
            method: self.method,
            paid_credits: self.paid_credits,
            granted_credits: self.granted_credits,
            target_ongoing_balance: self.target_ongoing_balance.flatten(),
            started_at: self.started_at.flatten(),
            expiration_at: self.expiration_at.flatten(),
            invoice_requires_successful_payment: self
                .invoice_requires_successful_payment
                .unwrap_or(false),
            transaction_metadata: self.transaction_metadata.clone(),
        })
    }
}
