//! Bell-LaPadula decision engine.
//!
//! Core principle: **a subject may read a resource only if its security
//! weight dominates the resource's, and their categories are compatible.**
//!
//! The evaluator is a pure function over pre-resolved labels; it performs
//! no I/O and holds no state beyond a read-only [`RuleSet`].

mod error;
mod evaluate;
mod label;
mod rules;

pub use error::{Error, Result};
pub use evaluate::{evaluate, ReasonCode, Verdict};
pub use label::{Category, Operation, Resource, ResourceKind, SecurityLevel, Subject, TrustTier};
pub use rules::{DenyPair, RuleSet};
