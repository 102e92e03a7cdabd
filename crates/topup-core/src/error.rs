//! # Error Types: Structured Error Hierarchy
//!
//! Errors shared by every crate in the workspace. All errors use `thiserror`.
//!
//! ## Design
//!
//! - Parsing errors carry the offending input.
//! - Validation errors identify the position of the offending rule spec in
//!   the caller's request and the field that failed, so a caller can fix a
//!   single entry without guessing.

use thiserror::Error;

/// Top-level error type for parsing and constructing core values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopupError {
    /// A string did not name a known enum variant.
    #[error("unknown {kind} {value:?}")]
    UnknownVariant {
        /// The enum being parsed (e.g. "trigger").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A credit amount was negative.
    #[error("credit amount must not be negative, got {0}")]
    NegativeCredits(String),

    /// A decimal string could not be parsed.
    #[error("invalid decimal {0:?}")]
    InvalidDecimal(String),

    /// An identifier was not a valid UUID.
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
}

/// A rule spec failed structural validation.
///
/// `index` is the zero-based position of the spec in the incoming list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("recurring_transaction_rules[{index}].{field}: {reason}")]
pub struct ValidationError {
    /// Position of the offending spec in the request.
    pub index: usize,
    /// Name of the offending field.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    /// Build a validation error for the spec at `index`.
    pub fn new(index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            index,
            field,
            reason: reason.into(),
        }
    }
}
