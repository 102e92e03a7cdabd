//! # topup-state: Wallet and Rule Records
//!
//! The persisted shape of wallets and their recurring transaction rules, and
//! the only lifecycle a rule has:
//!
//! ```text
//! Active ──terminate──▶ Terminated (terminal, retained for audit)
//! ```
//!
//! ## Modules
//!
//! - **Wallet** (`wallet.rs`): the owning wallet and the configuration a rule
//!   inherits at creation.
//! - **Rule** (`rule.rs`): rule record, creation input with persistence
//!   defaults, in-place patching, termination, and structural checks.
//!
//! ## Design
//!
//! A rule belongs to exactly one wallet and its `id`/`wallet_id` never change.
//! Patching a terminated rule is rejected; terminating a terminated rule is a
//! no-op so termination can be retried safely.

pub mod rule;
pub mod wallet;

pub use rule::{
    NewRule, RecurringTransactionRule, RuleError, RulePatch, RuleStatus, RuleViolation,
};
pub use wallet::{NewWallet, Wallet};
