//! Configuration loading from labelguard.toml.

use policy::RuleSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Database path. Overridable with `--db`; falls back to the per-user
    /// data directory when absent.
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Override rules (denied category pairs, weight floor).
    #[serde(flatten)]
    pub rules: RuleSet,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The default configuration: built-in rule table, default db location.
    pub fn default_config() -> Self {
        Self {
            database: None,
            rules: RuleSet::builtin(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
database = "/tmp/labelguard.db"
floor_weight = 1

[[deny]]
subject = "GEN"
resource = "FIN"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.database.as_deref().unwrap().to_str(), Some("/tmp/labelguard.db"));
        assert!(config.rules.is_denied("GEN", "FIN"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.database.is_none());
        assert!(config.rules.deny.is_empty());
    }
}
