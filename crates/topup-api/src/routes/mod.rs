//! # API Route Modules
//!
//! - `wallets`: wallet creation and lookup.
//! - `rules`: recurring transaction rule reconciliation and listing.
//! - `audit`: per-wallet audit trail (Postgres mode only).

pub mod audit;
pub mod rules;
pub mod wallets;
