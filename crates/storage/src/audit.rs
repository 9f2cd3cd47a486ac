//! Append-only audit trail: one policy record and one decision record per
//! evaluation, linked 1:1 and written in a single transaction.

use chrono::{DateTime, Utc};
use policy::{Operation, ReasonCode, Resource, ResourceKind, Subject, Verdict};
use rusqlite::params;
use serde::Serialize;
use std::str::FromStr;

use crate::{Error, Result, Store};

/// Identifier shared by a policy record and its decision record.
///
/// Assigned by the storage layer; unique and monotonically increasing under
/// concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored decision outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessResult {
    Allow,
    Deny,
}

impl AccessResult {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessResult::Allow => "ALLOW",
            AccessResult::Deny => "DENY",
        }
    }

    fn from_verdict(verdict: &Verdict) -> Self {
        if verdict.allowed {
            AccessResult::Allow
        } else {
            AccessResult::Deny
        }
    }
}

impl std::fmt::Display for AccessResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was requested: immutable weight snapshots taken at request time.
/// Weights are `None` when the labels were unresolved (the request still
/// gets audited; the decision will be a fail-closed denial).
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRecord {
    pub id: RecordId,
    pub subject_id: i64,
    pub resource_id: i64,
    pub resource_kind: ResourceKind,
    pub subject_weight: Option<i64>,
    pub resource_weight: Option<i64>,
    pub operation: Operation,
    pub requested_at: DateTime<Utc>,
}

/// What was decided, keyed by the same id as its policy record.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub id: RecordId,
    pub result: AccessResult,
    pub reason: ReasonCode,
    pub decided_at: DateTime<Utc>,
}

/// One joined audit-trail entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub policy: PolicyRecord,
    pub decision: DecisionRecord,
}

/// The value handed back to the original caller: the verdict plus the audit
/// id when the audit write succeeded. A missing `audit_id` means the write
/// failed; it never means denial.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResult {
    pub allowed: bool,
    pub reason: ReasonCode,
    pub audit_id: Option<RecordId>,
}

impl DecisionResult {
    pub fn new(verdict: Verdict, audit_id: Option<RecordId>) -> Self {
        Self {
            allowed: verdict.allowed,
            reason: verdict.reason,
            audit_id,
        }
    }
}

impl Store {
    /// Append one policy record and one decision record for an evaluated
    /// request, atomically.
    ///
    /// The subject/resource pair must be the one the verdict was computed
    /// from; passing a mismatched verdict is a contract violation. On error
    /// neither row exists and the caller decides whether to retry or alert;
    /// the verdict itself is unaffected.
    pub fn record(
        &mut self,
        subject: &Subject,
        resource: &Resource,
        operation: Operation,
        verdict: &Verdict,
    ) -> Result<RecordId> {
        debug_assert!(
            !verdict.allowed || (subject.level.is_some() && resource.level.is_some()),
            "granted verdict for an unlabeled subject/resource pair"
        );

        let requested_at = Utc::now();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sys_access_policy
                 (subject_id, resource_id, resource_kind, subject_weight,
                  resource_weight, operation, requested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                subject.id,
                resource.id,
                resource.kind.as_str(),
                subject.level.as_ref().map(|l| l.weight),
                resource.level.as_ref().map(|l| l.weight),
                operation.as_str(),
                requested_at.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO sys_access_decision (decision_id, result, reason, decided_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                AccessResult::from_verdict(verdict).as_str(),
                verdict.reason.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(RecordId(id))
    }

    /// Load the most recent audit entries in chronological order.
    pub fn trail(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.policy_id, p.subject_id, p.resource_id, p.resource_kind,
                    p.subject_weight, p.resource_weight, p.operation, p.requested_at,
                    d.result, d.reason, d.decided_at
             FROM sys_access_policy p
             JOIN sys_access_decision d ON d.decision_id = p.policy_id
             ORDER BY p.policy_id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, subject_id, resource_id, kind, sw, rw, op, requested, result, reason, decided) in
            rows
        {
            let id = RecordId(id);
            entries.push(AuditEntry {
                policy: PolicyRecord {
                    id,
                    subject_id,
                    resource_id,
                    resource_kind: ResourceKind::from_str(&kind)
                        .map_err(|e| Error::Corrupt(e.to_string()))?,
                    subject_weight: sw,
                    resource_weight: rw,
                    operation: Operation::from_str(&op)
                        .map_err(|e| Error::Corrupt(e.to_string()))?,
                    requested_at: parse_timestamp(&requested)?,
                },
                decision: DecisionRecord {
                    id,
                    result: match result.as_str() {
                        "ALLOW" => AccessResult::Allow,
                        "DENY" => AccessResult::Deny,
                        other => {
                            return Err(Error::Corrupt(format!("unknown result '{other}'")));
                        }
                    },
                    reason: ReasonCode::from_str(&reason)
                        .map_err(|e| Error::Corrupt(e.to_string()))?,
                    decided_at: parse_timestamp(&decided)?,
                },
            });
        }
        entries.reverse();
        Ok(entries)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("bad timestamp '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::{evaluate, RuleSet, TrustTier};

    fn seeded() -> Store {
        let store = Store::in_memory().unwrap();
        store.seed_defaults().unwrap();
        store
    }

    fn labeled_pair(store: &Store) -> (Subject, Resource) {
        let secret = store.level_by_name("Secret").unwrap();
        let internal = store.level_by_name("Internal").unwrap();
        let fin = store.category_by_code("FIN").unwrap();
        store
            .assign_subject_labels(1, &secret, &fin, TrustTier::Ordinary)
            .unwrap();
        store
            .assign_resource_labels(ResourceKind::SalaryRecord, 7, &internal, &fin)
            .unwrap();
        (
            store.resolve_subject(1).unwrap(),
            store.resolve_resource(ResourceKind::SalaryRecord, 7).unwrap(),
        )
    }

    fn count(store: &Store, table: &str) -> i64 {
        store
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_record_links_policy_and_decision() {
        let mut store = seeded();
        let (subject, resource) = labeled_pair(&store);
        let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);
        assert!(verdict.is_allowed());

        let id = store
            .record(&subject, &resource, Operation::Read, &verdict)
            .unwrap();

        assert_eq!(count(&store, "sys_access_policy"), 1);
        assert_eq!(count(&store, "sys_access_decision"), 1);

        let trail = store.trail(10).unwrap();
        assert_eq!(trail.len(), 1);
        let entry = &trail[0];
        assert_eq!(entry.policy.id, id);
        assert_eq!(entry.decision.id, id);
        assert_eq!(entry.policy.subject_weight, Some(3));
        assert_eq!(entry.policy.resource_weight, Some(2));
        assert_eq!(entry.decision.result, AccessResult::Allow);
        assert_eq!(entry.decision.reason, ReasonCode::Granted);
    }

    #[test]
    fn test_record_ids_are_monotonic() {
        let mut store = seeded();
        let (subject, resource) = labeled_pair(&store);
        let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);

        let a = store
            .record(&subject, &resource, Operation::Read, &verdict)
            .unwrap();
        let b = store
            .record(&subject, &resource, Operation::Read, &verdict)
            .unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_failed_write_leaves_no_orphan() {
        let mut store = seeded();
        let (subject, resource) = labeled_pair(&store);
        let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);

        // Make the second insert fail; the whole transaction must roll back.
        store
            .conn
            .execute_batch("DROP TABLE sys_access_decision")
            .unwrap();
        let err = store.record(&subject, &resource, Operation::Read, &verdict);
        assert!(err.is_err());
        assert_eq!(count(&store, "sys_access_policy"), 0);
    }

    #[test]
    fn test_denial_is_audited_with_reason() {
        let mut store = seeded();
        let secret = store.level_by_name("Secret").unwrap();
        let public = store.level_by_name("Public").unwrap();
        let fin = store.category_by_code("FIN").unwrap();
        store
            .assign_subject_labels(2, &public, &fin, TrustTier::Ordinary)
            .unwrap();
        store
            .assign_resource_labels(ResourceKind::SalaryRecord, 9, &secret, &fin)
            .unwrap();

        let subject = store.resolve_subject(2).unwrap();
        let resource = store.resolve_resource(ResourceKind::SalaryRecord, 9).unwrap();
        let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);
        assert!(!verdict.is_allowed());

        store
            .record(&subject, &resource, Operation::Read, &verdict)
            .unwrap();
        let trail = store.trail(10).unwrap();
        assert_eq!(trail[0].decision.result, AccessResult::Deny);
        assert_eq!(trail[0].decision.reason, ReasonCode::InsufficientLevel);
    }

    #[test]
    fn test_unlabeled_request_audited_with_null_snapshot() {
        let mut store = seeded();
        let subject = store.resolve_subject(42).unwrap();
        let resource = store.resolve_resource(ResourceKind::Notice, 1).unwrap();
        let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);
        assert_eq!(verdict.reason, ReasonCode::MissingLabels);

        store
            .record(&subject, &resource, Operation::Read, &verdict)
            .unwrap();
        let trail = store.trail(10).unwrap();
        assert_eq!(trail[0].policy.subject_weight, None);
        assert_eq!(trail[0].decision.reason, ReasonCode::MissingLabels);
    }

    #[test]
    fn test_snapshots_survive_relabeling() {
        let mut store = seeded();
        let (subject, resource) = labeled_pair(&store);
        let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);
        store
            .record(&subject, &resource, Operation::Read, &verdict)
            .unwrap();

        // Admin demotes the subject afterwards.
        let public = store.level_by_name("Public").unwrap();
        let fin = store.category_by_code("FIN").unwrap();
        store
            .assign_subject_labels(1, &public, &fin, TrustTier::Ordinary)
            .unwrap();

        let trail = store.trail(10).unwrap();
        assert_eq!(trail[0].policy.subject_weight, Some(3));
    }

    #[test]
    fn test_trail_is_chronological_and_limited() {
        let mut store = seeded();
        let (subject, resource) = labeled_pair(&store);
        let verdict = evaluate(&RuleSet::builtin(), &subject, &resource, Operation::Read);

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(
                store
                    .record(&subject, &resource, Operation::Read, &verdict)
                    .unwrap(),
            );
        }

        let trail = store.trail(3).unwrap();
        assert_eq!(trail.len(), 3);
        // Most recent three, oldest first.
        assert_eq!(trail[0].policy.id, ids[2]);
        assert_eq!(trail[2].policy.id, ids[4]);
    }
}
