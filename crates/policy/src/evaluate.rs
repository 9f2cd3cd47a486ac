//! The decision function.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Operation, Resource, RuleSet, Subject};

/// Machine-readable decision reason. Exactly one reason is reported per
/// decision; the precedence order in [`evaluate`] makes it deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Granted,
    /// Subject or resource lacks a resolved level or category (fail-closed).
    MissingLabels,
    /// Subject weight does not dominate the resource weight.
    InsufficientLevel,
    /// The (subject category, resource category) pair is in the override table.
    OverrideDenied,
    /// Categories differ and the resource is not broadcast.
    CategoryMismatch,
    /// Operation outside the supported set (currently only READ).
    UnsupportedOperation,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::Granted => "granted",
            ReasonCode::MissingLabels => "missing_labels",
            ReasonCode::InsufficientLevel => "insufficient_level",
            ReasonCode::OverrideDenied => "override_denied",
            ReasonCode::CategoryMismatch => "category_mismatch",
            ReasonCode::UnsupportedOperation => "unsupported_operation",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "granted" => Ok(ReasonCode::Granted),
            "missing_labels" => Ok(ReasonCode::MissingLabels),
            "insufficient_level" => Ok(ReasonCode::InsufficientLevel),
            "override_denied" => Ok(ReasonCode::OverrideDenied),
            "category_mismatch" => Ok(ReasonCode::CategoryMismatch),
            "unsupported_operation" => Ok(ReasonCode::UnsupportedOperation),
            other => Err(Error::Invalid(format!("unknown reason code: {other}"))),
        }
    }
}

/// Result of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: ReasonCode,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: ReasonCode::Granted,
        }
    }

    pub fn deny(reason: ReasonCode) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Decide whether `subject` may perform `operation` on `resource`.
///
/// Pure: no I/O, no hidden lookups. Labels must already be resolved; a
/// missing level or category denies with [`ReasonCode::MissingLabels`].
///
/// Read-down dominance: allowed requires `subject.weight >= resource.weight`.
/// Category matching is skipped for broadcast resources (broadcast kind, or
/// resource weight at the catalog floor). For non-broadcast resources the
/// override table is consulted before the plain category comparison.
///
/// Denial reasons are reported with fixed precedence:
/// `UnsupportedOperation`, then `MissingLabels` > `InsufficientLevel` >
/// `OverrideDenied` > `CategoryMismatch`.
pub fn evaluate(
    rules: &RuleSet,
    subject: &Subject,
    resource: &Resource,
    operation: Operation,
) -> Verdict {
    if operation != Operation::Read {
        return Verdict::deny(ReasonCode::UnsupportedOperation);
    }

    let (Some(sub_level), Some(sub_cat)) = (&subject.level, &subject.category) else {
        return Verdict::deny(ReasonCode::MissingLabels);
    };
    let (Some(res_level), Some(res_cat)) = (&resource.level, &resource.category) else {
        return Verdict::deny(ReasonCode::MissingLabels);
    };

    let level_ok = sub_level.weight >= res_level.weight;

    // Broadcast resources are category-agnostic, including the override table.
    let broadcast = resource.kind.broadcast() || res_level.weight <= rules.floor();
    let override_hit = !broadcast && rules.is_denied(&sub_cat.code, &res_cat.code);
    let category_ok = broadcast || (!override_hit && sub_cat.id == res_cat.id);

    if level_ok && category_ok {
        return Verdict::allow();
    }

    let reason = if !level_ok {
        ReasonCode::InsufficientLevel
    } else if override_hit {
        ReasonCode::OverrideDenied
    } else {
        ReasonCode::CategoryMismatch
    };
    Verdict::deny(reason)
}
