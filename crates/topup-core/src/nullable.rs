//! # Absent vs. Explicit Null
//!
//! Update semantics need three states for a nullable field:
//!
//! | JSON            | Rust                |
//! |-----------------|---------------------|
//! | field missing   | `None`              |
//! | `"field": null` | `Some(None)`        |
//! | `"field": v`    | `Some(Some(v))`     |
//!
//! Use together with `#[serde(default)]`:
//!
//! ```
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Patch {
//!     #[serde(default, deserialize_with = "topup_core::nullable::deserialize")]
//!     expiration_at: Option<Option<String>>,
//! }
//!
//! let p: Patch = serde_json::from_str(r#"{"expiration_at": null}"#).unwrap();
//! assert_eq!(p.expiration_at, Some(None));
//! let p: Patch = serde_json::from_str("{}").unwrap();
//! assert_eq!(p.expiration_at, None);
//! ```

use serde::{Deserialize, Deserializer};

/// Deserialize a present field (possibly `null`) into `Some(_)`.
///
/// Missing fields never reach this function; `#[serde(default)]` yields `None`.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
