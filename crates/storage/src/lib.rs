//! SQLite-backed persistence for the labelguard decision engine.
//!
//! This crate owns the two things the pure evaluator deliberately does not:
//! the **label catalog** and the **audit trail**.
//!
//! # Overview
//!
//! 1. **Label Catalog** — security levels, categories, and the label
//!    assignments for subjects and resources. The catalog resolves a subject
//!    or resource id into the by-value label structs the evaluator consumes;
//!    the evaluator itself never touches the database.
//!
//! 2. **Audit Trail** — the append-only record of every decision: one
//!    policy-request row and one decision row per evaluation, linked 1:1 by a
//!    shared monotonically increasing id and written in a single transaction.
//!    Either both rows exist or neither does.
//!
//! # Core concepts
//!
//! ## Store
//!
//! The [`Store`] wraps a SQLite database and provides catalog resolution,
//! audit appends, and trail queries.
//!
//! ## Snapshots
//!
//! Audit rows copy the subject and resource weights *at request time*.
//! Re-labeling a subject later never alters a historical record; that is the
//! core auditability invariant.
//!
//! ## RecordId
//!
//! A [`RecordId`] identifies one policy/decision pair. It is assigned by the
//! storage layer, unique and monotonically increasing under concurrent
//! callers.
//!
//! # Example
//!
//! ```no_run
//! use policy::{evaluate, Operation, ResourceKind, RuleSet};
//! use storage::Store;
//!
//! let mut store = Store::open("labelguard.db")?;
//! store.seed_defaults()?;
//!
//! // Resolve labels, decide, then record unconditionally.
//! let subject = store.resolve_subject(1)?;
//! let resource = store.resolve_resource(ResourceKind::SalaryRecord, 7)?;
//! let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);
//!
//! match store.record(&subject, &resource, Operation::Read, &verdict) {
//!     Ok(id) => println!("audited as {id}"),
//!     // The verdict stands even when the audit write fails; the error is
//!     // the caller's to surface.
//!     Err(e) => eprintln!("audit write failed: {e}"),
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod audit;
mod error;
mod store;

pub use audit::{AccessResult, AuditEntry, DecisionRecord, DecisionResult, PolicyRecord, RecordId};
pub use error::{Error, Result};
pub use store::Store;
