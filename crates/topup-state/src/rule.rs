//! # Recurring Transaction Rule
//!
//! A rule tells the wallet when to top itself up ([`Trigger`]) and by how
//! much ([`Method`]). Which fields are meaningful depends on those two:
//!
//! | trigger     | requires                 |
//! |-------------|--------------------------|
//! | `interval`  | `interval`               |
//! | `threshold` | `threshold_credits`      |
//!
//! | method   | uses                                  |
//! |----------|---------------------------------------|
//! | `fixed`  | `paid_credits`, `granted_credits`     |
//! | `target` | `target_ongoing_balance`              |
//!
//! ## Persistence defaults
//!
//! Fields omitted at creation take the defaults the rules table declares:
//! `method = fixed`, credit amounts `0`, no target balance, no dates, empty
//! metadata. `invoice_requires_successful_payment` has no table default; it is
//! resolved from the wallet before a [`NewRule`] is built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use topup_core::{Credits, Decimal, Interval, MetadataEntry, Method, RuleId, Trigger, WalletId};

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Participates in matching and fires.
    #[default]
    Active,
    /// No longer desired. Kept for audit; never matched again.
    Terminated,
}

impl RuleStatus {
    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Terminated => "terminated",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::str::FromStr for RuleStatus {
    type Err = topup_core::TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "terminated" => Ok(Self::Terminated),
            other => Err(topup_core::TopupError::UnknownVariant {
                kind: "rule status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from rule lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Attempted to modify a terminated rule.
    #[error("rule {id} is terminated and cannot be updated")]
    Terminated {
        /// The rule identifier.
        id: RuleId,
    },
}

/// A rule whose fields are inconsistent with its trigger or method.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct RuleViolation {
    pub field: &'static str,
    pub reason: String,
}

impl RuleViolation {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

// ─── Creation input ──────────────────────────────────────────────────

/// Fields for a rule about to be created.
///
/// `None` means "take the persistence default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    pub trigger: Trigger,
    pub interval: Option<Interval>,
    pub threshold_credits: Option<Credits>,
    pub method: Option<Method>,
    pub paid_credits: Option<Credits>,
    pub granted_credits: Option<Credits>,
    pub target_ongoing_balance: Option<Decimal>,
    pub started_at: Option<DateTime<Utc>>,
    pub expiration_at: Option<DateTime<Utc>>,
    pub invoice_requires_successful_payment: bool,
    pub transaction_metadata: Option<Vec<MetadataEntry>>,
}

// ─── Patch ───────────────────────────────────────────────────────────

/// Fields to overwrite on an existing rule.
///
/// Outer `None` leaves the field untouched. For nullable columns the inner
/// `Option` carries an explicit clear (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePatch {
    pub trigger: Option<Trigger>,
    pub interval: Option<Option<Interval>>,
    pub threshold_credits: Option<Credits>,
    pub method: Option<Method>,
    pub paid_credits: Option<Credits>,
    pub granted_credits: Option<Credits>,
    pub target_ongoing_balance: Option<Option<Decimal>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub expiration_at: Option<Option<DateTime<Utc>>>,
    pub invoice_requires_successful_payment: Option<bool>,
    pub transaction_metadata: Option<Vec<MetadataEntry>>,
}

// ─── Rule ────────────────────────────────────────────────────────────

/// A recurring transaction rule as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTransactionRule {
    pub id: RuleId,
    pub wallet_id: WalletId,
    pub trigger: Trigger,
    pub interval: Option<Interval>,
    pub threshold_credits: Credits,
    pub method: Method,
    pub paid_credits: Credits,
    pub granted_credits: Credits,
    pub target_ongoing_balance: Option<Decimal>,
    pub started_at: Option<DateTime<Utc>>,
    pub expiration_at: Option<DateTime<Utc>>,
    pub invoice_requires_successful_payment: bool,
    #[serde(default)]
    pub transaction_metadata: Vec<MetadataEntry>,
    #[serde(default)]
    pub status: RuleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub terminated_at: Option<DateTime<Utc>>,
}

impl RecurringTransactionRule {
    /// Build an active rule from creation input, applying persistence defaults.
    pub fn create(id: RuleId, wallet_id: WalletId, new: NewRule, now: DateTime<Utc>) -> Self {
        Self {
            id,
            wallet_id,
            trigger: new.trigger,
            interval: new.interval,
            threshold_credits: new.threshold_credits.unwrap_or(Credits::ZERO),
            method: new.method.unwrap_or_default(),
            paid_credits: new.paid_credits.unwrap_or(Credits::ZERO),
            granted_credits: new.granted_credits.unwrap_or(Credits::ZERO),
            target_ongoing_balance: new.target_ongoing_balance,
            started_at: new.started_at,
            expiration_at: new.expiration_at,
            invoice_requires_successful_payment: new.invoice_requires_successful_payment,
            transaction_metadata: new.transaction_metadata.unwrap_or_default(),
            status: RuleStatus::Active,
            created_at: now,
            updated_at: now,
            terminated_at: None,
        }
    }

    /// Whether the rule participates in matching.
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// The rule as it would look after `patch`, without touching timestamps.
    pub fn patched(&self, patch: &RulePatch) -> Self {
        let mut next = self.clone();
        next.overwrite(patch);
        next
    }

    /// Apply `patch` in place.
    ///
    /// Returns whether any field changed; `updated_at` only moves when one did,
    /// so re-applying the same patch leaves the record byte-for-byte equal.
    pub fn apply_patch(
        &mut self,
        patch: &RulePatch,
        now: DateTime<Utc>,
    ) -> Result<bool, RuleError> {
        if self.status.is_terminal() {
            return Err(RuleError::Terminated { id: self.id });
        }
        let before = self.clone();
        self.overwrite(patch);
        let changed = *self != before;
        if changed {
            self.updated_at = now;
        }
        Ok(changed)
    }

    /// Transition to `Terminated`.
    ///
    /// Returns `false` when the rule was already terminated.
    pub fn terminate(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RuleStatus::Terminated;
        self.terminated_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Check that the fields are consistent with trigger and method.
    pub fn check(&self) -> Result<(), RuleViolation> {
        if self.trigger == Trigger::Interval && self.interval.is_none() {
            return Err(RuleViolation::new(
                "interval",
                "is required when trigger is interval",
            ));
        }
        if self.method == Method::Target && self.target_ongoing_balance.is_none() {
            return Err(RuleViolation::new(
                "target_ongoing_balance",
                "is required when method is target",
            ));
        }
        if let (Some(start), Some(end)) = (self.started_at, self.expiration_at) {
            if end <= start {
                return Err(RuleViolation::new(
                    "expiration_at",
                    format!("must be after started_at ({start})"),
                ));
            }
        }
        if let Some(pos) = self
            .transaction_metadata
            .iter()
            .position(|entry| entry.key.trim().is_empty())
        {
            return Err(RuleViolation::new(
                "transaction_metadata",
                format!("entry {pos} has an empty key"),
            ));
        }
        Ok(())
    }

    fn overwrite(&mut self, patch: &RulePatch) {
        if let Some(trigger) = patch.trigger {
            self.trigger = trigger;
        }
        if let Some(interval) = patch.interval {
            self.interval = interval;
        }
        if let Some(threshold) = patch.threshold_credits {
            self.threshold_credits = threshold;
        }
        if let Some(method) = patch.method {
            self.method = method;
        }
        if let Some(paid) = patch.paid_credits {
            self.paid_credits = paid;
        }
        if let Some(granted) = patch.granted_credits {
            self.granted_credits = granted;
        }
        if let Some(target) = patch.target_ongoing_balance {
            self.target_ongoing_balance = target;
        }
        if let Some(started_at) = patch.started_at {
            self.started_at = started_at;
        }
        if let Some(expiration_at) = patch.expiration_at {
            self.expiration_at = expiration_at;
        }
        if let Some(flag) = patch.invoice_requires_successful_payment {
            self.invoice_requires_successful_payment = flag;
        }
        if let Some(metadata) = &patch.transaction_metadata {
            self.transaction_metadata = metadata.clone();
        }
    }
}
