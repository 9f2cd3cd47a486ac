//! Label types consumed by the evaluator.
//!
//! Labels are resolved by the persistence collaborator before evaluation;
//! nothing here triggers a lookup. A subject or resource whose labels could
//! not be resolved carries `None` and fails closed.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// A security level: totally ordered by `weight` (lower = less sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLevel {
    pub id: i64,
    pub name: String,
    pub weight: i64,
}

impl SecurityLevel {
    pub fn new(id: i64, name: impl Into<String>, weight: i64) -> Self {
        Self {
            id,
            name: name.into(),
            weight,
        }
    }
}

/// A functional compartment (e.g. finance, general affairs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub code: String,
    pub name: String,
}

impl Category {
    pub fn new(id: i64, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Trust tier of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Ordinary,
    Administrative,
}

/// The acting principal, with labels resolved at request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub level: Option<SecurityLevel>,
    pub category: Option<Category>,
    pub tier: TrustTier,
}

impl Subject {
    pub fn labeled(id: i64, level: SecurityLevel, category: Category, tier: TrustTier) -> Self {
        Self {
            id,
            level: Some(level),
            category: Some(category),
            tier,
        }
    }

    /// A subject with no resolved labels. Evaluates to a fail-closed denial.
    pub fn unlabeled(id: i64) -> Self {
        Self {
            id,
            level: None,
            category: None,
            tier: TrustTier::Ordinary,
        }
    }
}

/// Closed set of resource kinds.
///
/// Each kind carries a static `broadcast` capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    SalaryRecord,
    Notice,
}

impl ResourceKind {
    /// True for kinds intentionally visible across all categories.
    pub fn broadcast(self) -> bool {
        matches!(self, ResourceKind::Notice)
    }

    /// Stable discriminator used in storage and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::SalaryRecord => "salary-record",
            ResourceKind::Notice => "notice",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "salary-record" => Ok(ResourceKind::SalaryRecord),
            "notice" => Ok(ResourceKind::Notice),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}

/// The object being accessed, with labels resolved at request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub kind: ResourceKind,
    pub level: Option<SecurityLevel>,
    pub category: Option<Category>,
}

impl Resource {
    pub fn labeled(id: i64, kind: ResourceKind, level: SecurityLevel, category: Category) -> Self {
        Self {
            id,
            kind,
            level: Some(level),
            category: Some(category),
        }
    }

    /// A resource with no resolved labels. Evaluates to a fail-closed denial.
    pub fn unlabeled(id: i64, kind: ResourceKind) -> Self {
        Self {
            id,
            kind,
            level: None,
            category: None,
        }
    }
}

/// Requested operation. Only READ is supported; WRITE is an extension point
/// and is rejected, never silently treated as a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Operation::Read),
            "write" => Ok(Operation::Write),
            other => Err(Error::Invalid(format!("unknown operation: {other}"))),
        }
    }
}
