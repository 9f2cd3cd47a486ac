//! SQLite store: schema, label catalog, and resolution.

use policy::{Category, Resource, ResourceKind, SecurityLevel, Subject, TrustTier};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

/// Bounded wait on a locked database; past this the write surfaces as an
/// error rather than hanging the caller.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed catalog and audit store.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_conn(Connection::open(path)?)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::from_conn(Connection::open_in_memory()?)
    }

    fn from_conn(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sys_security_level (
                level_id INTEGER PRIMARY KEY,
                level_name TEXT NOT NULL UNIQUE,
                level_weight INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sys_security_category (
                category_id INTEGER PRIMARY KEY,
                category_code TEXT NOT NULL UNIQUE,
                category_name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS subject_label (
                subject_id INTEGER PRIMARY KEY,
                level_id INTEGER NOT NULL REFERENCES sys_security_level(level_id),
                category_id INTEGER NOT NULL REFERENCES sys_security_category(category_id),
                trust_tier TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS resource_label (
                resource_kind TEXT NOT NULL,
                resource_id INTEGER NOT NULL,
                level_id INTEGER NOT NULL REFERENCES sys_security_level(level_id),
                category_id INTEGER NOT NULL REFERENCES sys_security_category(category_id),
                PRIMARY KEY (resource_kind, resource_id)
            );
            CREATE TABLE IF NOT EXISTS sys_access_policy (
                policy_id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id INTEGER NOT NULL,
                resource_id INTEGER NOT NULL,
                resource_kind TEXT NOT NULL,
                subject_weight INTEGER,
                resource_weight INTEGER,
                operation TEXT NOT NULL,
                requested_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sys_access_decision (
                decision_id INTEGER PRIMARY KEY REFERENCES sys_access_policy(policy_id),
                result TEXT NOT NULL,
                reason TEXT NOT NULL,
                decided_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_access_policy_time
                ON sys_access_policy(requested_at);
            "#,
        )?;
        Ok(())
    }

    /// Seed the default catalog: four levels and the finance/general-affairs
    /// categories. Idempotent.
    pub fn seed_defaults(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            INSERT OR IGNORE INTO sys_security_level (level_id, level_name, level_weight) VALUES
                (1, 'Public', 1),
                (2, 'Internal', 2),
                (3, 'Secret', 3),
                (4, 'TopSecret', 4);
            INSERT OR IGNORE INTO sys_security_category (category_id, category_code, category_name) VALUES
                (1, 'FIN', 'Finance'),
                (2, 'GEN', 'General Affairs');
            "#,
        )?;
        Ok(())
    }

    /// Look up a security level by name.
    pub fn level_by_name(&self, name: &str) -> Result<SecurityLevel> {
        self.conn
            .query_row(
                "SELECT level_id, level_name, level_weight FROM sys_security_level
                 WHERE level_name = ?1",
                [name],
                |row| Ok(SecurityLevel::new(row.get(0)?, row.get::<_, String>(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("security level '{name}'")))
    }

    /// Look up a category by code.
    pub fn category_by_code(&self, code: &str) -> Result<Category> {
        self.conn
            .query_row(
                "SELECT category_id, category_code, category_name FROM sys_security_category
                 WHERE category_code = ?1",
                [code],
                |row| {
                    Ok(Category::new(
                        row.get(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("category '{code}'")))
    }

    /// The catalog's minimum security weight (the broadcast floor).
    pub fn min_weight(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT MIN(level_weight) FROM sys_security_level", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?
            .ok_or_else(|| Error::NotFound("security levels".to_string()))
    }

    /// Assign (or reassign) a subject's labels. Historical audit snapshots
    /// are unaffected.
    pub fn assign_subject_labels(
        &self,
        subject_id: i64,
        level: &SecurityLevel,
        category: &Category,
        tier: TrustTier,
    ) -> Result<()> {
        let tier = match tier {
            TrustTier::Ordinary => "ordinary",
            TrustTier::Administrative => "administrative",
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO subject_label (subject_id, level_id, category_id, trust_tier)
             VALUES (?1, ?2, ?3, ?4)",
            params![subject_id, level.id, category.id, tier],
        )?;
        Ok(())
    }

    /// Assign (or reassign) a resource's labels.
    pub fn assign_resource_labels(
        &self,
        kind: ResourceKind,
        resource_id: i64,
        level: &SecurityLevel,
        category: &Category,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO resource_label (resource_kind, resource_id, level_id, category_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), resource_id, level.id, category.id],
        )?;
        Ok(())
    }

    /// Resolve a subject's current labels. A subject with no assignment is
    /// returned unlabeled and will fail closed at evaluation.
    pub fn resolve_subject(&self, subject_id: i64) -> Result<Subject> {
        let row = self
            .conn
            .query_row(
                "SELECT l.level_id, l.level_name, l.level_weight,
                        c.category_id, c.category_code, c.category_name,
                        s.trust_tier
                 FROM subject_label s
                 JOIN sys_security_level l ON l.level_id = s.level_id
                 JOIN sys_security_category c ON c.category_id = s.category_id
                 WHERE s.subject_id = ?1",
                [subject_id],
                |row| {
                    Ok((
                        SecurityLevel::new(row.get(0)?, row.get::<_, String>(1)?, row.get(2)?),
                        Category::new(
                            row.get(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ),
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(Subject::unlabeled(subject_id)),
            Some((level, category, tier)) => {
                let tier = match tier.as_str() {
                    "ordinary" => TrustTier::Ordinary,
                    "administrative" => TrustTier::Administrative,
                    other => {
                        return Err(Error::Corrupt(format!(
                            "unknown trust tier '{other}' for subject {subject_id}"
                        )));
                    }
                };
                Ok(Subject::labeled(subject_id, level, category, tier))
            }
        }
    }

    /// Resolve a resource's current labels. Unassigned resources come back
    /// unlabeled and fail closed.
    pub fn resolve_resource(&self, kind: ResourceKind, resource_id: i64) -> Result<Resource> {
        let row = self
            .conn
            .query_row(
                "SELECT l.level_id, l.level_name, l.level_weight,
                        c.category_id, c.category_code, c.category_name
                 FROM resource_label r
                 JOIN sys_security_level l ON l.level_id = r.level_id
                 JOIN sys_security_category c ON c.category_id = r.category_id
                 WHERE r.resource_kind = ?1 AND r.resource_id = ?2",
                params![kind.as_str(), resource_id],
                |row| {
                    Ok((
                        SecurityLevel::new(row.get(0)?, row.get::<_, String>(1)?, row.get(2)?),
                        Category::new(
                            row.get(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ),
                    ))
                },
            )
            .optional()?;

        Ok(match row {
            None => Resource::unlabeled(resource_id, kind),
            Some((level, category)) => Resource::labeled(resource_id, kind, level, category),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_and_resolve_subject() {
        let store = Store::in_memory().unwrap();
        store.seed_defaults().unwrap();

        let secret = store.level_by_name("Secret").unwrap();
        assert_eq!(secret.weight, 3);
        let fin = store.category_by_code("FIN").unwrap();

        store
            .assign_subject_labels(1, &secret, &fin, TrustTier::Ordinary)
            .unwrap();

        let subject = store.resolve_subject(1).unwrap();
        assert_eq!(subject.level.as_ref().unwrap().weight, 3);
        assert_eq!(subject.category.as_ref().unwrap().code, "FIN");
    }

    #[test]
    fn test_unassigned_subject_is_unlabeled() {
        let store = Store::in_memory().unwrap();
        store.seed_defaults().unwrap();

        let subject = store.resolve_subject(42).unwrap();
        assert!(subject.level.is_none());
        assert!(subject.category.is_none());
    }

    #[test]
    fn test_resolve_resource_by_kind() {
        let store = Store::in_memory().unwrap();
        store.seed_defaults().unwrap();

        let internal = store.level_by_name("Internal").unwrap();
        let fin = store.category_by_code("FIN").unwrap();
        store
            .assign_resource_labels(ResourceKind::SalaryRecord, 7, &internal, &fin)
            .unwrap();

        let resource = store.resolve_resource(ResourceKind::SalaryRecord, 7).unwrap();
        assert_eq!(resource.level.as_ref().unwrap().weight, 2);

        // Same id under another kind is a different resource.
        let other = store.resolve_resource(ResourceKind::Notice, 7).unwrap();
        assert!(other.level.is_none());
    }

    #[test]
    fn test_reassign_replaces_labels() {
        let store = Store::in_memory().unwrap();
        store.seed_defaults().unwrap();

        let public = store.level_by_name("Public").unwrap();
        let top = store.level_by_name("TopSecret").unwrap();
        let gen_cat = store.category_by_code("GEN").unwrap();

        store
            .assign_subject_labels(1, &public, &gen_cat, TrustTier::Ordinary)
            .unwrap();
        store
            .assign_subject_labels(1, &top, &gen_cat, TrustTier::Administrative)
            .unwrap();

        let subject = store.resolve_subject(1).unwrap();
        assert_eq!(subject.level.as_ref().unwrap().weight, 4);
        assert_eq!(subject.tier, TrustTier::Administrative);
    }

    #[test]
    fn test_min_weight_is_broadcast_floor() {
        let store = Store::in_memory().unwrap();
        store.seed_defaults().unwrap();
        assert_eq!(store.min_weight().unwrap(), 1);
    }

    #[test]
    fn test_unknown_level_is_not_found() {
        let store = Store::in_memory().unwrap();
        store.seed_defaults().unwrap();
        assert!(matches!(
            store.level_by_name("Mystery"),
            Err(Error::NotFound(_))
        ));
    }
}
