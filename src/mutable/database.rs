//! Mutable views over databases.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{CollectionBuilder, Database, DatabaseBuilder};

use super::collection::MutableCollection;
use super::errors::{MutationError, MutationResult};
use super::state::ElementState;

/// A mutable view over one database. Collections can be added and
/// removed.
#[derive(Debug)]
pub struct MutableDatabase {
    wrapped: Arc<Database>,
    collections_by_name: HashMap<String, (MutableCollection, ElementState)>,
}

impl MutableDatabase {
    pub(crate) fn new(wrapped: Arc<Database>) -> MutableDatabase {
        let collections_by_name = wrapped
            .collections()
            .map(|collection| {
                (
                    collection.name().to_string(),
                    (
                        MutableCollection::new(collection.clone()),
                        ElementState::NotChanged,
                    ),
                )
            })
            .collect();
        MutableDatabase {
            wrapped,
            collections_by_name,
        }
    }

    pub fn name(&self) -> &str {
        self.wrapped.name()
    }

    pub fn identifier(&self) -> &str {
        self.wrapped.identifier()
    }

    pub fn has_changed(&self) -> bool {
        self.collections_by_name
            .values()
            .any(|entry| Self::entry_state(entry).is_changed())
    }

    fn entry_state((collection, stored): &(MutableCollection, ElementState)) -> ElementState {
        if *stored == ElementState::NotChanged && collection.has_changed() {
            ElementState::Modified
        } else {
            *stored
        }
    }

    /// Creates an empty collection.
    pub fn add_collection(
        &mut self,
        name: impl Into<String>,
        identifier: impl Into<String>,
    ) -> MutationResult<&mut MutableCollection> {
        let name = name.into();
        let identifier = identifier.into();
        if self.collection_by_name(&name).is_some() {
            return Err(MutationError::DuplicateCollection {
                database: self.name().to_string(),
                name,
            });
        }
        if self.collection_by_identifier(&identifier).is_some() {
            return Err(MutationError::DuplicateCollectionIdentifier {
                database: self.name().to_string(),
                identifier,
            });
        }
        let old_state = self
            .collections_by_name
            .get(&name)
            .map_or(ElementState::NotExistent, Self::entry_state);
        old_state.assert_legal_transition(ElementState::Added);

        let value = (
            MutableCollection::new(CollectionBuilder::new(name.clone(), identifier).build()),
            ElementState::Added,
        );
        let entry = match self.collections_by_name.entry(name) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(value);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(value),
        };
        Ok(&mut entry.0)
    }

    /// Marks a collection as removed. Returns false when no alive
    /// collection carries the name.
    pub fn remove_collection_by_name(&mut self, name: &str) -> bool {
        let Some(entry) = self.collections_by_name.get_mut(name) else {
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

    /// Marks a collection as removed by its identifier. Returns false
    /// when no alive collection carries it.
    pub fn remove_collection_by_identifier(&mut self, identifier: &str) -> bool {
        let Some(name) = self
            .collection_by_identifier(identifier)
            .map(|collection| collection.name().to_string())
        else {
            return false;
        };
        self.remove_collection_by_name(&name)
    }

    /// Alive collections.
    pub fn collections(&self) -> impl Iterator<Item = &MutableCollection> {
        self.collections_by_name
            .values()
            .filter(|entry| Self::entry_state(entry).is_alive())
            .map(|(collection, _)| collection)
    }

    pub fn collection_by_name(&self, name: &str) -> Option<&MutableCollection> {
        self.collections_by_name
            .get(name)
            .filter(|entry| Self::entry_state(entry).is_alive())
            .map(|(collection, _)| collection)
    }

    pub fn collection_by_name_mut(&mut self, name: &str) -> Option<&mut MutableCollection> {
        let alive = self
            .collections_by_name
            .get(name)
            .is_some_and(|entry| Self::entry_state(entry).is_alive());
        if !alive {
            return None;
        }
        self.collections_by_name
            .get_mut(name)
            .map(|entry| &mut entry.0)
    }

    pub fn collection_by_identifier(&self, identifier: &str) -> Option<&MutableCollection> {
        self.collections()
            .find(|collection| collection.identifier() == identifier)
    }

    /// Collections that diverge from the wrapped database, with their
    /// change state.
    pub fn modified_collections(
        &self,
    ) -> impl Iterator<Item = (&MutableCollection, ElementState)> {
        self.collections_by_name
            .values()
            .map(|entry| (&entry.0, Self::entry_state(entry)))
            .filter(|(_, state)| state.is_changed())
    }

    /// Freezes this view. Untouched views hand back the wrapped
    /// database, preserving pointer identity.
    pub fn immutable_copy(&self) -> Arc<Database> {
        if !self.has_changed() {
            return self.wrapped.clone();
        }
        let mut builder = DatabaseBuilder::new(self.name(), self.identifier());
        for entry in self.collections_by_name.values() {
            if Self::entry_state(entry).is_alive() {
                builder = builder.put_collection(entry.0.immutable_copy());
            }
        }
        builder.build()
    }
}
