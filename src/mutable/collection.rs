//! Mutable views over collections, including the index consistency
//! queries used while merging.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{
    Collection, CollectionBuilder, DocPart, DocPartBuilder, DocPartIndex, DocPartView, Field,
    Index, IndexView, TableRef,
};

use super::doc_part::MutableDocPart;
use super::errors::{MutationError, MutationResult};
use super::index::MutableIndex;
use super::state::ElementState;

/// A mutable view over one collection.
///
/// Doc parts can be added but never removed; logical indexes can be
/// added and removed. Every doc part and index of the wrapped collection
/// is reachable through this view from the start.
#[derive(Debug)]
pub struct MutableCollection {
    wrapped: Arc<Collection>,
    doc_parts: HashMap<TableRef, MutableDocPart>,
    indexes_by_name: HashMap<String, (MutableIndex, ElementState)>,
}

impl MutableCollection {
    pub(crate) fn new(wrapped: Arc<Collection>) -> MutableCollection {
        let doc_parts = wrapped
            .doc_parts()
            .map(|doc_part| {
                (
                    doc_part.table_ref().clone(),
                    MutableDocPart::new(doc_part.clone()),
                )
            })
            .collect();
        let indexes_by_name = wrapped
            .indexes()
            .map(|index| {
                (
                    index.name().to_string(),
                    (
                        MutableIndex::from_index(index.clone()),
                        ElementState::NotChanged,
                    ),
                )
            })
            .collect();
        MutableCollection {
            wrapped,
            doc_parts,
            indexes_by_name,
        }
    }

    pub fn name(&self) -> &str {
        self.wrapped.name()
    }

    pub fn identifier(&self) -> &str {
        self.wrapped.identifier()
    }

    /// Whether anything under this view diverges from the wrapped
    /// collection.
    pub fn has_changed(&self) -> bool {
        self.doc_parts
            .values()
            .any(MutableDocPart::has_changed)
            || self
                .indexes_by_name
                .values()
                .any(|entry| Self::entry_state(entry).is_changed())
    }

    fn entry_state((index, stored): &(MutableIndex, ElementState)) -> ElementState {
        if *stored == ElementState::NotChanged && index.has_changed() {
            ElementState::Modified
        } else {
            *stored
        }
    }

    // === Doc parts ===

    /// Creates an empty doc part at a document path.
    pub fn add_doc_part(
        &mut self,
        table_ref: TableRef,
        identifier: impl Into<String>,
    ) -> MutationResult<&mut MutableDocPart> {
        let identifier = identifier.into();
        if self.doc_parts.contains_key(&table_ref) {
            return Err(MutationError::DuplicateDocPart {
                collection: self.name().to_string(),
                table_ref: table_ref.to_string(),
            });
        }
        if self.doc_part_by_identifier(&identifier).is_some() {
            return Err(MutationError::DuplicateDocPartIdentifier {
                collection: self.name().to_string(),
                identifier,
            });
        }
        let doc_part = MutableDocPart::new_added(
            DocPartBuilder::new(table_ref.clone(), identifier).build(),
        );
        Ok(self.doc_parts.entry(table_ref).or_insert(doc_part))
    }

    pub fn doc_parts(&self) -> impl Iterator<Item = &MutableDocPart> {
        self.doc_parts.values()
    }

    pub fn doc_part_by_table_ref(&self, table_ref: &TableRef) -> Option<&MutableDocPart> {
        self.doc_parts.get(table_ref)
    }

    pub fn doc_part_by_table_ref_mut(
        &mut self,
        table_ref: &TableRef,
    ) -> Option<&mut MutableDocPart> {
        self.doc_parts.get_mut(table_ref)
    }

    pub fn doc_part_by_identifier(&self, identifier: &str) -> Option<&MutableDocPart> {
        self.doc_parts
            .values()
            .find(|doc_part| doc_part.identifier() == identifier)
    }

    /// Doc parts that diverge from the wrapped collection.
    pub fn modified_doc_parts(&self) -> impl Iterator<Item = &MutableDocPart> {
        self.doc_parts
            .values()
            .filter(|doc_part| doc_part.has_changed())
    }

    // === Logical indexes ===

    /// Declares a new logical index; fields are added on the returned
    /// view.
    pub fn add_index(
        &mut self,
        name: impl Into<String>,
        unique: bool,
    ) -> MutationResult<&mut MutableIndex> {
        let name = name.into();
        if self.index_by_name(&name).is_some() {
            return Err(MutationError::DuplicateIndex {
                collection: self.name().to_string(),
                name,
            });
        }
        let old_state = self
            .indexes_by_name
            .get(&name)
            .map_or(ElementState::NotExistent, Self::entry_state);
        old_state.assert_legal_transition(ElementState::Added);

        use std::collections::hash_map::Entry;
        let value = (MutableIndex::new(name.clone(), unique), ElementState::Added);
        let entry = match self.indexes_by_name.entry(name) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(value);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(value),
        };
        Ok(&mut entry.0)
    }

    /// Marks a logical index as removed. Returns false when no alive
    /// index carries the name.
    pub fn remove_index_by_name(&mut self, name: &str) -> bool {
        let Some(entry) = self.indexes_by_name.get_mut(name) else {
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

    /// Alive logical indexes.
    pub fn indexes(&self) -> impl Iterator<Item = &MutableIndex> {
        self.indexes_by_name
            .values()
            .filter(|entry| Self::entry_state(entry).is_alive())
            .map(|(index, _)| index)
    }

    pub fn index_by_name(&self, name: &str) -> Option<&MutableIndex> {
        self.indexes_by_name
            .get(name)
            .filter(|entry| Self::entry_state(entry).is_alive())
            .map(|(index, _)| index)
    }

    pub fn index_by_name_mut(&mut self, name: &str) -> Option<&mut MutableIndex> {
        self.indexes_by_name
            .get_mut(name)
            .filter(|entry| Self::entry_state(entry).is_alive())
            .map(|entry| &mut entry.0)
    }

    /// Logical indexes that diverge from the wrapped collection, with
    /// their change state.
    pub fn modified_indexes(&self) -> impl Iterator<Item = (&MutableIndex, ElementState)> {
        self.indexes_by_name
            .values()
            .map(|entry| (&entry.0, Self::entry_state(entry)))
            .filter(|(_, state)| state.is_changed())
    }

    // === Index consistency queries ===
    //
    // These answer, against an older committed collection, whether a
    // change being merged leaves some logical index without a physical
    // realization or some physical index without a logical reason to
    // exist.

    /// Combinations of alive logical indexes that a new field completes,
    /// one entry per distinct identifier combination.
    pub fn missing_indexes_for_new_field(
        &self,
        doc_part: &MutableDocPart,
        new_field: &Field,
    ) -> Vec<(Arc<Index>, Vec<String>)> {
        let mut missing: Vec<(Arc<Index>, Vec<String>)> = Vec::new();
        for index in self.indexes() {
            if index
                .field_by_table_ref_and_name(doc_part.table_ref(), new_field.name())
                .is_none()
            {
                continue;
            }
            for identifiers in index.doc_part_index_identifiers(doc_part) {
                if !identifiers
                    .iter()
                    .any(|identifier| identifier == new_field.identifier())
                {
                    continue;
                }
                if missing.iter().any(|(_, existing)| *existing == identifiers) {
                    continue;
                }
                missing.push((index.immutable_copy(), identifiers));
            }
        }
        missing
    }

    /// A committed logical index that covers the new field but has no
    /// matching physical index in the new doc part structure.
    pub fn any_missed_index_for_new_field(
        &self,
        old_collection: &Collection,
        new_structure: &MutableDocPart,
        old_structure: &DocPart,
        new_field: &Field,
    ) -> Option<String> {
        old_collection
            .indexes()
            .find(|old_index| {
                old_index
                    .field_by_table_ref_and_name(old_structure.table_ref(), new_field.name())
                    .is_some()
                    && (self.index_by_name(old_index.name()).is_none()
                        || old_index
                            .doc_part_index_identifiers(new_structure)
                            .into_iter()
                            .filter(|identifiers| {
                                identifiers
                                    .iter()
                                    .any(|identifier| identifier == new_field.identifier())
                            })
                            .any(|identifiers| {
                                new_structure.indexes().all(|doc_part_index| {
                                    !old_index.is_match(
                                        new_structure,
                                        &identifiers,
                                        &**doc_part_index,
                                    )
                                })
                            }))
            })
            .map(|old_index| old_index.name().to_string())
    }

    /// A committed logical index realized by a physical index that the
    /// other side removed.
    pub fn any_missed_index_for_removed_doc_part_index(
        &self,
        old_collection: &Collection,
        removed: &DocPartIndex,
    ) -> Option<String> {
        for old_index in old_collection.indexes() {
            for table_ref in old_index.table_refs() {
                let Some(old_doc_part) = old_collection.doc_part_by_table_ref(table_ref) else {
                    continue;
                };
                if old_index.is_compatible_with_index(&**old_doc_part, removed)
                    && !self.modified_indexes().any(|(index, state)| {
                        state == ElementState::Removed && index.name() == old_index.name()
                    })
                {
                    return Some(old_index.name().to_string());
                }
            }
        }
        None
    }

    /// Any logical index, changed here or committed, that a new physical
    /// index can realize.
    pub fn any_related_index(
        &self,
        old_collection: &Collection,
        new_structure: &MutableDocPart,
        new_doc_part_index: &DocPartIndex,
    ) -> Option<String> {
        let from_changes = self
            .modified_indexes()
            .map(|(index, _)| index)
            .find(|index| index.is_compatible_with_index(new_structure, new_doc_part_index))
            .map(|index| index.name().to_string());
        if from_changes.is_some() {
            return from_changes;
        }
        old_collection
            .indexes()
            .find(|index| index.is_compatible_with_index(new_structure, new_doc_part_index))
            .map(|index| index.name().to_string())
    }

    /// A committed logical index denoting the same index as a newly
    /// added one, unless it was removed here.
    pub fn any_conflicting_index(
        &self,
        old_structure: &Collection,
        new_index: &MutableIndex,
    ) -> Option<String> {
        old_structure
            .indexes()
            .find(|old_index| {
                old_index.matches_index(new_index)
                    && !self.modified_indexes().any(|(index, state)| {
                        state == ElementState::Removed && index.name() == old_index.name()
                    })
            })
            .map(|old_index| old_index.name().to_string())
    }

    /// A committed doc part on which a newly added logical index lacks a
    /// physical realization for some combination, counting the physical
    /// indexes added here. Returns the doc part identifier.
    pub fn any_doc_part_with_missed_doc_part_index(
        &self,
        old_structure: &Collection,
        new_index: &MutableIndex,
    ) -> Option<String> {
        for table_ref in new_index.table_refs() {
            let Some(old_doc_part) = old_structure.doc_part_by_table_ref(table_ref) else {
                continue;
            };
            if !new_index.is_compatible_with(&**old_doc_part) {
                continue;
            }
            let missed = new_index
                .doc_part_index_identifiers(&**old_doc_part)
                .into_iter()
                .filter(|identifiers| {
                    old_doc_part.indexes().all(|doc_part_index| {
                        !new_index.is_match(&**old_doc_part, identifiers, &**doc_part_index)
                    })
                })
                .any(|identifiers| {
                    let Some(new_doc_part) =
                        self.doc_part_by_table_ref(old_doc_part.table_ref())
                    else {
                        return true;
                    };
                    new_doc_part
                        .modified_indexes()
                        .filter(|(_, state)| *state != ElementState::Removed)
                        .all(|(doc_part_index, _)| {
                            !new_index.is_match(new_doc_part, &identifiers, &**doc_part_index)
                        })
                });
            if missed {
                return Some(old_doc_part.identifier().to_string());
            }
        }
        None
    }

    /// A committed physical index left without any logical index to
    /// justify it once a removed logical index is merged. Returns the
    /// physical index identifier.
    pub fn any_orphan_doc_part_index(
        &self,
        old_structure: &Collection,
        removed_index: &MutableIndex,
    ) -> Option<String> {
        for table_ref in removed_index.table_refs() {
            let Some(old_doc_part) = old_structure.doc_part_by_table_ref(table_ref) else {
                continue;
            };
            if !removed_index.is_compatible_with(&**old_doc_part) {
                continue;
            }
            for old_doc_part_index in old_doc_part.indexes() {
                if !removed_index.is_compatible_with_index(&**old_doc_part, &**old_doc_part_index)
                {
                    continue;
                }
                let removed_here = self
                    .doc_part_by_table_ref(old_doc_part.table_ref())
                    .is_some_and(|new_doc_part| {
                        new_doc_part.modified_indexes().any(|(index, state)| {
                            state == ElementState::Removed
                                && index.identifier() == old_doc_part_index.identifier()
                        })
                    });
                if removed_here {
                    continue;
                }
                let still_justified = old_structure.indexes().any(|old_index| {
                    old_index.is_compatible_with_index(&**old_doc_part, &**old_doc_part_index)
                        && !self.modified_indexes().any(|(index, state)| {
                            state == ElementState::Removed && index.name() == old_index.name()
                        })
                });
                if !still_justified {
                    return Some(old_doc_part_index.identifier().to_string());
                }
            }
        }
        None
    }

    /// Freezes this view. Untouched views hand back the wrapped
    /// collection, preserving pointer identity.
    pub fn immutable_copy(&self) -> Arc<Collection> {
        if !self.has_changed() {
            return self.wrapped.clone();
        }
        let mut builder = CollectionBuilder::new(self.name(), self.identifier());
        for doc_part in self.doc_parts.values() {
            builder = builder.put_doc_part(doc_part.immutable_copy());
        }
        for entry in self.indexes_by_name.values() {
            if Self::entry_state(entry).is_alive() {
                builder = builder.put_index(entry.0.immutable_copy());
            }
        }
        builder.build()
    }
}
