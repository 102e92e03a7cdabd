//! # topup-core: Foundational Types for Wallet Top-Up Rules
//!
//! This crate is the leaf of the workspace dependency graph. It defines the
//! primitives every other crate speaks in: identifiers, credit amounts, the
//! trigger/interval/method vocabulary of a recurring transaction rule, and
//! the error hierarchy.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `WalletId` and `RuleId` wrap UUIDs so a rule
//!    identity can never be passed where a wallet identity is expected.
//!
//! 2. **Decimal credits, never floats.** `Credits` wraps `rust_decimal::Decimal`
//!    and rejects negative values at construction.
//!
//! 3. **Closed enums.** `Trigger`, `Interval` and `Method` are exhaustive;
//!    string forms are only produced/parsed at the storage and wire edges.
//!
//! 4. **Absent vs. null.** [`nullable`] distinguishes a field that was not
//!    sent from a field explicitly sent as `null`, which update semantics need.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `topup-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod credits;
pub mod domain;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod nullable;

// Re-export primary types for ergonomic imports.
pub use credits::Credits;
pub use domain::{Interval, Method, Trigger};
pub use error::{TopupError, ValidationError};
pub use identity::{RuleId, WalletId};
pub use metadata::MetadataEntry;
pub use rust_decimal::Decimal;
