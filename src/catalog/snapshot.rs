//! Snapshots: an immutable view of the whole metadata catalog.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::database::Database;

/// An immutable, internally consistent view of every database known to
/// the engine. Snapshots are shared freely between threads; readers
/// holding one are never affected by later commits.
#[derive(Debug, Default)]
pub struct Snapshot {
    databases_by_name: HashMap<String, Arc<Database>>,
    databases_by_identifier: HashMap<String, Arc<Database>>,
}

impl Snapshot {
    /// A snapshot with no databases.
    pub fn empty() -> Arc<Snapshot> {
        Arc::new(Snapshot::default())
    }

    pub fn databases(&self) -> impl Iterator<Item = &Arc<Database>> {
        self.databases_by_name.values()
    }

    pub fn database_by_name(&self, name: &str) -> Option<&Arc<Database>> {
        self.databases_by_name.get(name)
    }

    pub fn database_by_identifier(&self, identifier: &str) -> Option<&Arc<Database>> {
        self.databases_by_identifier.get(identifier)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot ({} databases)", self.databases_by_name.len())
    }
}

/// Single-use builder for [`Snapshot`].
#[derive(Default)]
pub struct SnapshotBuilder {
    databases: Vec<Arc<Database>>,
}

impl SnapshotBuilder {
    pub fn new() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn from_snapshot(other: &Snapshot) -> SnapshotBuilder {
        SnapshotBuilder {
            databases: other.databases_by_name.values().cloned().collect(),
        }
    }

    /// Adds a database, replacing any previous one with the same name.
    pub fn put_database(mut self, database: Arc<Database>) -> SnapshotBuilder {
        self.databases
            .retain(|existing| existing.name() != database.name());
        self.databases.push(database);
        self
    }

    pub fn remove_database(mut self, name: &str) -> SnapshotBuilder {
        self.databases.retain(|existing| existing.name() != name);
        self
    }

    pub fn build(self) -> Arc<Snapshot> {
        let mut databases_by_name = HashMap::with_capacity(self.databases.len());
        let mut databases_by_identifier = HashMap::with_capacity(self.databases.len());
        for database in self.databases {
            databases_by_identifier.insert(database.identifier().to_string(), database.clone());
            databases_by_name.insert(database.name().to_string(), database);
        }
        Arc::new(Snapshot {
            databases_by_name,
            databases_by_identifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::database::DatabaseBuilder;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert_eq!(snapshot.databases().count(), 0);
        assert!(snapshot.database_by_name("app").is_none());
    }

    #[test]
    fn test_rebuild_keeps_shared_databases() {
        let database = DatabaseBuilder::new("app", "app_1").build();
        let first = SnapshotBuilder::new().put_database(database.clone()).build();
        let second = SnapshotBuilder::from_snapshot(&first).build();
        let a = first.database_by_name("app").unwrap();
        let b = second.database_by_name("app").unwrap();
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_database_lookups_agree() {
        let snapshot = SnapshotBuilder::new()
            .put_database(DatabaseBuilder::new("app", "app_1").build())
            .build();
        let by_name = snapshot.database_by_name("app").unwrap();
        let by_identifier = snapshot.database_by_identifier("app_1").unwrap();
        assert!(Arc::ptr_eq(by_name, by_identifier));
        assert!(snapshot.database_by_identifier("app").is_none());
    }
}
