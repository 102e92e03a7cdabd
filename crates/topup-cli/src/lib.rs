//! # topup-cli: CLI Tool for Wallet Top-Up Rules
//!
//! Provides the `topup` command-line interface for working with rule spec
//! files offline.
//!
//! ## Subcommands
//!
//! - `topup validate`: static checks over a spec file.
//! - `topup reconcile`: run a real reconciliation against a wallet snapshot
//!   held in memory, printing the outcome and the resulting snapshot.
//!
//! ```bash
//! topup validate --specs rules.yaml
//! topup reconcile --snapshot wallet.json --specs rules.json --output after.json
//! ```
//!
//! ## Spec files
//!
//! JSON (`.json`) or YAML (anything else). Either a bare list of rule specs
//! or an object with a `recurring_transaction_rules` list, the same body the
//! HTTP API takes.

pub mod reconcile;
pub mod validate;

use std::path::Path;

use anyhow::{bail, Context, Result};

use topup_reconcile::RuleSpec;

/// Read a spec file.
pub fn load_specs(path: &Path) -> Result<Vec<RuleSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let value: serde_json::Value = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("{} is not valid YAML", path.display()))?
    };

    let list = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => match map.remove("recurring_transaction_rules") {
            Some(list) => list,
            None => bail!(
                "{}: expected a list or an object with recurring_transaction_rules",
                path.display()
            ),
        },
        _ => bail!("{}: expected a list of rule specs", path.display()),
    };

    serde_json::from_value(list)
        .with_context(|| format!("{}: invalid rule spec", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_bare_json_list() {
        let file = write(".json", r#"[{"trigger": "threshold", "threshold_credits": "5"}]"#);
        let specs = load_specs(file.path()).unwrap();
        assert_eq!(specs.len(), 1);
        assert!(specs[0].trigger.is_some());
    }

    #[test]
    fn loads_wrapped_yaml() {
        let file = write(
            ".yaml",
            "recurring_transaction_rules:\n  - trigger: interval\n    interval: weekly\n    paid_credits: 10\n",
        );
        let specs = load_specs(file.path()).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].paid_credits, Some("10".parse::<topup_core::Credits>().unwrap()));
    }

    #[test]
    fn yaml_null_clears_nullable_field() {
        let file = write(".yml", "- lago_id: abc\n  interval: null\n");
        let specs = load_specs(file.path()).unwrap();
        assert_eq!(specs[0].interval, Some(None));
    }

    #[test]
    fn rejects_scalar_document() {
        let file = write(".json", "42");
        assert!(load_specs(file.path()).is_err());
    }

    #[test]
    fn rejects_unknown_trigger() {
        let file = write(".json", r#"[{"trigger": "manual"}]"#);
        assert!(load_specs(file.path()).is_err());
    }
}
