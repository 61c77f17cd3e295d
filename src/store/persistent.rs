//! Session store backed by redb embedded database.
//!
//! One table holds every visitor's values keyed by `(visitor, key)`, so a
//! session survives process restarts.

use anyhow::{Context, Result};
use redb::{Database, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::SessionStore;

/// redb table for session values (key: (visitor, key), value: stored string).
const SESSION_VALUES_TABLE: TableDefinition<(&str, &str), &str> =
    TableDefinition::new("sso_session_values");

/// Handle to the session database.
#[derive(Clone)]
pub struct RedbSessionStore {
    db: Arc<Database>,
}

impl RedbSessionStore {
    /// Open or create a session store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let db = Database::create(path)
            .with_context(|| format!("Failed to open session database: {:?}", path))?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSION_VALUES_TABLE)?;
        }
        write_txn.commit()?;

        debug!(path = ?path, "Opened session database");

        Ok(Self { db: Arc::new(db) })
    }

    /// View of the store scoped to one visitor.
    pub fn for_visitor(&self, visitor: &str) -> VisitorStore {
        VisitorStore {
            db: Arc::clone(&self.db),
            visitor: visitor.to_string(),
        }
    }

    /// Number of stored values across all visitors.
    pub fn value_count(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_VALUES_TABLE)?;
        Ok(table.len()? as usize)
    }
}

/// A single visitor's session, as the host would hand it to the SSO layer.
pub struct VisitorStore {
    db: Arc<Database>,
    visitor: String,
}

impl VisitorStore {
    pub fn visitor(&self) -> &str {
        &self.visitor
    }
}

impl SessionStore for VisitorStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_VALUES_TABLE)?;
        let value = table
            .get((self.visitor.as_str(), key))?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION_VALUES_TABLE)?;
            table.insert((self.visitor.as_str(), key), value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SESSION_VALUES_TABLE)?;
            let result = table.remove((self.visitor.as_str(), key))?;
            result.is_some()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (RedbSessionStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("sessions.redb");
        let store = RedbSessionStore::open(&path).unwrap();
        (store, dir)
    }

    #[test]
    fn test_visitors_are_isolated() {
        let (store, _dir) = test_store();
        let alice = store.for_visitor("alice");
        let bob = store.for_visitor("bob");

        alice.set("maestrano", "blob-a").unwrap();
        assert_eq!(alice.get("maestrano").unwrap().as_deref(), Some("blob-a"));
        assert_eq!(bob.get("maestrano").unwrap(), None);
        assert_eq!(alice.visitor(), "alice");

        bob.set("maestrano", "blob-b").unwrap();
        assert_eq!(store.value_count().unwrap(), 2);
    }

    #[test]
    fn test_separator_in_names_does_not_alias() {
        let (store, _dir) = test_store();
        store.for_visitor("a/b").set("maestrano", "blob-of-a/b").unwrap();

        let other = store.for_visitor("a");
        assert_eq!(other.get("b/maestrano").unwrap(), None);
        assert!(!other.remove("b/maestrano").unwrap());

        other.set("b/maestrano", "blob-of-a").unwrap();
        assert_eq!(
            store.for_visitor("a/b").get("maestrano").unwrap().as_deref(),
            Some("blob-of-a/b")
        );
        assert_eq!(store.value_count().unwrap(), 2);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let (store, _dir) = test_store();
        let visitor = store.for_visitor("alice");

        visitor.set("maestrano", "first").unwrap();
        visitor.set("maestrano", "second").unwrap();
        assert_eq!(visitor.get("maestrano").unwrap().as_deref(), Some("second"));
        assert_eq!(store.value_count().unwrap(), 1);

        assert!(visitor.remove("maestrano").unwrap());
        assert!(!visitor.remove("maestrano").unwrap());
        assert_eq!(visitor.get("maestrano").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.redb");

        {
            let store = RedbSessionStore::open(&path).unwrap();
            store.for_visitor("alice").set("maestrano", "persisted").unwrap();
        }

        let store = RedbSessionStore::open(&path).unwrap();
        assert_eq!(
            store.for_visitor("alice").get("maestrano").unwrap().as_deref(),
            Some("persisted")
        );
    }
}
