//! Rule set loading.

use std::path::{Path, PathBuf};

use sigilforge_domain::{RuleSet, RuleSetError};

#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("Failed to read rule set {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rule set: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] RuleSetError),
}

/// Read, parse and validate the rule set at `path`.
pub fn load_rule_set(path: impl AsRef<Path>) -> Result<RuleSet, RuleLoadError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = parse_rule_set(&json)?;
    tracing::info!(
        path = %path.display(),
        abilities = rules.abilities.len(),
        conditions = rules.conditions.len(),
        exhaustion_tiers = rules.exhaustion.len(),
        "Loaded rule set"
    );
    Ok(rules)
}

pub fn parse_rule_set(json: &str) -> Result<RuleSet, RuleLoadError> {
    let rules: RuleSet = serde_json::from_str(json)?;
    rules.validate()?;
    Ok(rules)
}
