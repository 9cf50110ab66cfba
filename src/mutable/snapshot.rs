//! Mutable views over whole snapshots.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{DatabaseBuilder, Snapshot, SnapshotBuilder};

use super::database::MutableDatabase;
use super::errors::{MutationError, MutationResult};
use super::state::ElementState;

/// A mutable view over a snapshot: the entry point of every catalog
/// change. All mutation flows from here down through databases,
/// collections and doc parts; the base snapshot is never touched.
#[derive(Debug)]
pub struct MutableSnapshot {
    wrapped: Arc<Snapshot>,
    databases_by_name: HashMap<String, (MutableDatabase, ElementState)>,
    /// Repository that handed this view out, when one did. Merging
    /// checks it so views from another repository are rejected.
    origin: Option<u64>,
}

impl MutableSnapshot {
    pub fn new(wrapped: Arc<Snapshot>) -> MutableSnapshot {
        let databases_by_name = wrapped
            .databases()
            .map(|database| {
                (
                    database.name().to_string(),
                    (
                        MutableDatabase::new(database.clone()),
                        ElementState::NotChanged,
                    ),
                )
            })
            .collect();
        MutableSnapshot {
            wrapped,
            databases_by_name,
            origin: None,
        }
    }

    pub(crate) fn with_origin(wrapped: Arc<Snapshot>, origin: u64) -> MutableSnapshot {
        let mut snapshot = MutableSnapshot::new(wrapped);
        snapshot.origin = Some(origin);
        snapshot
    }

    pub(crate) fn origin(&self) -> Option<u64> {
        self.origin
    }

    /// The snapshot this view was opened on.
    pub fn base(&self) -> &Arc<Snapshot> {
        &self.wrapped
    }

    pub fn has_changed(&self) -> bool {
        self.databases_by_name
            .values()
            .any(|entry| Self::entry_state(entry).is_changed())
    }

    fn entry_state((database, stored): &(MutableDatabase, ElementState)) -> ElementState {
        if *stored == ElementState::NotChanged && database.has_changed() {
            ElementState::Modified
        } else {
            *stored
        }
    }

    /// Creates an empty database.
    pub fn add_database(
        &mut self,
        name: impl Into<String>,
        identifier: impl Into<String>,
    ) -> MutationResult<&mut MutableDatabase> {
        let name = name.into();
        let identifier = identifier.into();
        if self.database_by_name(&name).is_some() {
            return Err(MutationError::DuplicateDatabase { name });
        }
        if self.database_by_identifier(&identifier).is_some() {
            return Err(MutationError::DuplicateDatabaseIdentifier { identifier });
        }
        let old_state = self
            .databases_by_name
            .get(&name)
            .map_or(ElementState::NotExistent, Self::entry_state);
        old_state.assert_legal_transition(ElementState::Added);

        let value = (
            MutableDatabase::new(DatabaseBuilder::new(name.clone(), identifier).build()),
            ElementState::Added,
        );
        let entry = match self.databases_by_name.entry(name) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(value);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(value),
        };
        Ok(&mut entry.0)
    }

    /// Marks a database as removed. Returns false when no alive database
    /// carries the name.
    pub fn remove_database_by_name(&mut self, name: &str) -> bool {
        let Some(entry) = self.databases_by_name.get_mut(name) else {
            return false;
        };
        let state = Self::entry_state(entry);
        if !state.is_alive() {
            return false;
        }
        state.assert_legal_transition(ElementState::Removed);
        entry.1 = ElementState::Removed;
        true
    }

    /// Marks a database as removed by its identifier. Returns false when
    /// no alive database carries it.
    pub fn remove_database_by_identifier(&mut self, identifier: &str) -> bool {
        let Some(name) = self
            .database_by_identifier(identifier)
            .map(|database| database.name().to_string())
        else {
            return false;
        };
        self.remove_database_by_name(&name)
    }

    /// Alive databases.
    pub fn databases(&self) -> impl Iterator<Item = &MutableDatabase> {
        self.databases_by_name
            .values()
            .filter(|entry| Self::entry_state(entry).is_alive())
            .map(|(database, _)| database)
    }

    pub fn database_by_name(&self, name: &str) -> Option<&MutableDatabase> {
        self.databases_by_name
            .get(name)
            .filter(|entry| Self::entry_state(entry).is_alive())
            .map(|(database, _)| database)
    }

    pub fn database_by_name_mut(&mut self, name: &str) -> Option<&mut MutableDatabase> {
        let alive = self
            .databases_by_name
            .get(name)
            .is_some_and(|entry| Self::entry_state(entry).is_alive());
        if !alive {
            return None;
        }
        self.databases_by_name
            .get_mut(name)
            .map(|entry| &mut entry.0)
    }

    pub fn database_by_identifier(&self, identifier: &str) -> Option<&MutableDatabase> {
        self.databases()
            .find(|database| database.identifier() == identifier)
    }

    /// Databases that diverge from the base snapshot, with their change
    /// state.
    pub fn modified_databases(&self) -> impl Iterator<Item = (&MutableDatabase, ElementState)> {
        self.databases_by_name
            .values()
            .map(|entry| (&entry.0, Self::entry_state(entry)))
            .filter(|(_, state)| state.is_changed())
    }

    /// Freezes this view into an immutable snapshot. Untouched views
    /// hand back the base snapshot, preserving pointer identity.
    pub fn immutable_copy(&self) -> Arc<Snapshot> {
        if !self.has_changed() {
            return self.wrapped.clone();
        }
        let mut builder = SnapshotBuilder::new();
        for entry in self.databases_by_name.values() {
            if Self::entry_state(entry).is_alive() {
                builder = builder.put_database(entry.0.immutable_copy());
            }
        }
        builder.build()
    }
}
