//! Override rule table loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// A (subject category, resource category) pair that is always denied for
/// non-broadcast resources, regardless of level dominance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyPair {
    /// Subject category code (e.g. "GEN").
    pub subject: String,
    /// Resource category code (e.g. "FIN").
    pub resource: String,
}

/// Override rules, read-only after load.
///
/// `floor_weight` is the broadcast floor: any resource at or below that
/// weight is treated as broadcast even when its kind is not. When unset, the
/// caller is expected to supply the catalog's minimum weight via
/// [`RuleSet::or_floor`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub deny: Vec<DenyPair>,

    #[serde(default)]
    pub floor_weight: Option<i64>,
}

/// Floor used when neither the configuration nor the catalog supplied one.
const DEFAULT_FLOOR: i64 = 1;

impl RuleSet {
    /// Load rules from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse rules from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// The built-in rule table: general-affairs subjects never read finance
    /// resources.
    pub fn builtin() -> Self {
        Self {
            deny: vec![DenyPair {
                subject: "GEN".to_string(),
                resource: "FIN".to_string(),
            }],
            floor_weight: None,
        }
    }

    /// Fill in the weight floor (typically the catalog minimum) unless the
    /// configuration already set one.
    pub fn or_floor(mut self, floor_weight: i64) -> Self {
        self.floor_weight.get_or_insert(floor_weight);
        self
    }

    /// The effective broadcast floor.
    pub fn floor(&self) -> i64 {
        self.floor_weight.unwrap_or(DEFAULT_FLOOR)
    }

    /// Whether the pair of category codes matches an override denial.
    pub fn is_denied(&self, subject_code: &str, resource_code: &str) -> bool {
        self.deny
            .iter()
            .any(|p| p.subject == subject_code && p.resource == resource_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_denies_gen_to_fin() {
        let rules = RuleSet::builtin();
        assert!(rules.is_denied("GEN", "FIN"));
        assert!(!rules.is_denied("FIN", "GEN"));
        assert!(!rules.is_denied("FIN", "FIN"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
floor_weight = 2

[[deny]]
subject = "GEN"
resource = "FIN"

[[deny]]
subject = "GEN"
resource = "HR"
"#;
        let rules = RuleSet::parse(toml).unwrap();
        assert_eq!(rules.floor(), 2);
        assert!(rules.is_denied("GEN", "FIN"));
        assert!(rules.is_denied("GEN", "HR"));
        assert!(!rules.is_denied("HR", "GEN"));
    }

    #[test]
    fn test_parse_defaults() {
        let rules = RuleSet::parse("").unwrap();
        assert!(rules.deny.is_empty());
        assert_eq!(rules.floor_weight, None);
        assert_eq!(rules.floor(), 1);
    }

    #[test]
    fn test_configured_floor_wins_over_catalog() {
        // An operator-set floor survives; the catalog minimum only fills the
        // gap when the configuration left the floor unset.
        let configured = RuleSet::parse("floor_weight = 3").unwrap().or_floor(1);
        assert_eq!(configured.floor(), 3);

        let unset = RuleSet::parse("").unwrap().or_floor(2);
        assert_eq!(unset.floor(), 2);
    }
}
