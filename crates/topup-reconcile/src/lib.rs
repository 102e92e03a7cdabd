//! # topup-reconcile: Rule Reconciliation
//!
//! Keeps a wallet's recurring transaction rules consistent with a declarative
//! list supplied by the caller. Each pass computes the minimal set of
//! create / update / terminate actions and applies them atomically.
//!
//! ## Modules
//!
//! - **Spec** (`spec.rs`): the caller's rule description, with absent vs.
//!   `null` distinguished on nullable fields.
//! - **Policy** (`policy.rs`): default inheritance from the wallet at creation.
//! - **Validate** (`validate.rs`): request-level and per-rule checks.
//! - **Plan** (`plan.rs`): matching by identity, orphan computation.
//! - **Store** (`store.rs`): `RuleStore`, `RuleTransaction` and `Terminator`
//!   collaborator traits.
//! - **Memory** (`memory.rs`): in-memory `RuleStore` with per-wallet locks.
//! - **Reconciler** (`reconciler.rs`): drives a pass end to end.
//!
//! ## Guarantees
//!
//! After a successful pass the wallet's active rules are exactly the updated
//! rules plus the created rules, one per incoming spec. Every other
//! previously active rule has been handed to the `Terminator` once. A failed
//! pass persists nothing.

pub mod counters;
pub mod memory;
pub mod plan;
pub mod policy;
pub mod reconciler;
pub mod spec;
pub mod store;
pub mod validate;

pub use memory::{InMemoryRuleStore, WalletSnapshot};
pub use plan::{Plan, PlanError, UnresolvedIdentity};
pub use policy::resolve_creation;
pub use reconciler::{
    ReconcileConfig, ReconcileError, ReconcileOutcome, Reconciler, DEFAULT_LOCK_TIMEOUT,
};
pub use spec::RuleSpec;
pub use store::{
    LifecycleTerminator, RuleStore, RuleTransaction, StatusFilter, StoreError, Terminator,
};
pub use validate::validate_request;
