//! Transaction metadata attached to the wallet transactions a rule emits.
//!
//! Metadata is an ordered list of key/value pairs and is opaque to
//! reconciliation: it is stored and replaced wholesale, never merged.

use serde::{Deserialize, Serialize};

/// A single metadata key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
