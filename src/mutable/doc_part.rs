//! Mutable views over doc parts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::catalog::{
    DocPart, DocPartBuilder, DocPartIndex, DocPartIndexView, DocPartView, Field,
    FieldIndexOrdering, FieldType, IndexView, Scalar, TableRef,
};

use super::doc_part_index::MutableDocPartIndex;
use super::errors::{MutationError, MutationResult};
use super::state::ElementState;

/// A mutable view over one doc part.
///
/// Fields and scalars can only be added; physical indexes can be added
/// (built incrementally, then identified) or removed. Everything else of
/// the wrapped doc part shows through unchanged.
#[derive(Debug)]
pub struct MutableDocPart {
    wrapped: Arc<DocPart>,
    /// All fields, wrapped and added, grouped by document-facing name.
    fields_by_name: HashMap<String, Vec<Field>>,
    added_fields: Vec<Field>,
    /// Scalars added by this view; wrapped scalars stay in `wrapped`.
    new_scalars: BTreeMap<FieldType, Scalar>,
    indexes_by_identifier: HashMap<String, (Arc<DocPartIndex>, ElementState)>,
    added_mutable_indexes: Vec<MutableDocPartIndex>,
    next_index_id: usize,
    dirty: bool,
}

impl MutableDocPart {
    pub(crate) fn new(wrapped: Arc<DocPart>) -> MutableDocPart {
        let mut fields_by_name: HashMap<String, Vec<Field>> = HashMap::new();
        for field in wrapped.fields() {
            fields_by_name
                .entry(field.name().to_string())
                .or_default()
                .push(field.clone());
        }
        let indexes_by_identifier = wrapped
            .indexes()
            .map(|index| {
                (
                    index.identifier().to_string(),
                    (index.clone(), ElementState::NotChanged),
                )
            })
            .collect();
        MutableDocPart {
            wrapped,
            fields_by_name,
            added_fields: Vec::new(),
            new_scalars: BTreeMap::new(),
            indexes_by_identifier,
            added_mutable_indexes: Vec::new(),
            next_index_id: 0,
            dirty: false,
        }
    }

    /// Wraps a doc part that did not exist in the base snapshot; the
    /// view counts as changed from the start so the new doc part reaches
    /// the next immutable copy even if it stays empty.
    pub(crate) fn new_added(wrapped: Arc<DocPart>) -> MutableDocPart {
        let mut doc_part = MutableDocPart::new(wrapped);
        doc_part.dirty = true;
        doc_part
    }

    /// Whether this view diverges from the wrapped doc part. Creating an
    /// in-progress physical index does not count until it is identified.
    pub fn has_changed(&self) -> bool {
        self.dirty
    }

    /// Stores a new field. Both the (name, type) pair and the column
    /// identifier must be free.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        identifier: impl Into<String>,
        field_type: FieldType,
    ) -> MutationResult<Field> {
        let name = name.into();
        let identifier = identifier.into();
        if self.field_by_name_and_type(&name, field_type).is_some() {
            return Err(MutationError::DuplicateField {
                doc_part: self.identifier().to_string(),
                name,
                field_type,
            });
        }
        if self.field_by_identifier(&identifier).is_some() {
            return Err(MutationError::DuplicateFieldIdentifier {
                doc_part: self.identifier().to_string(),
                identifier,
            });
        }
        let field = Field::new(name.clone(), identifier, field_type);
        self.fields_by_name
            .entry(name)
            .or_default()
            .push(field.clone());
        self.added_fields.push(field.clone());
        self.dirty = true;
        Ok(field)
    }

    /// Stores a new scalar. At most one scalar per storage type.
    pub fn add_scalar(
        &mut self,
        identifier: impl Into<String>,
        field_type: FieldType,
    ) -> MutationResult<Scalar> {
        if self.scalar_by_type(field_type).is_some() {
            return Err(MutationError::DuplicateScalar {
                doc_part: self.identifier().to_string(),
                field_type,
            });
        }
        let scalar = Scalar::new(identifier.into(), field_type);
        self.new_scalars.insert(field_type, scalar.clone());
        self.dirty = true;
        Ok(scalar)
    }

    pub fn added_fields(&self) -> impl Iterator<Item = &Field> {
        self.added_fields.iter()
    }

    pub fn added_field_by_identifier(&self, identifier: &str) -> Option<&Field> {
        self.added_fields
            .iter()
            .find(|field| field.identifier() == identifier)
    }

    pub fn added_scalars(&self) -> impl Iterator<Item = &Scalar> {
        self.new_scalars.values()
    }

    /// Opens a new in-progress physical index and returns its id within
    /// this doc part.
    pub fn add_doc_part_index(&mut self, unique: bool) -> usize {
        let id = self.next_index_id;
        self.next_index_id += 1;
        self.added_mutable_indexes
            .push(MutableDocPartIndex::new(id, unique));
        id
    }

    pub fn added_index(&self, id: usize) -> Option<&MutableDocPartIndex> {
        self.added_mutable_indexes
            .iter()
            .find(|index| index.id() == id)
    }

    pub fn added_index_mut(&mut self, id: usize) -> Option<&mut MutableDocPartIndex> {
        self.added_mutable_indexes
            .iter_mut()
            .find(|index| index.id() == id)
    }

    pub fn added_indexes(&self) -> impl Iterator<Item = &MutableDocPartIndex> {
        self.added_mutable_indexes.iter()
    }

    /// Freezes an in-progress index under its definitive identifier,
    /// registering it as an added physical index of this doc part.
    ///
    /// Panics if `id` does not refer to an in-progress index or if its
    /// columns are not contiguous from position 0.
    pub fn identify_doc_part_index(
        &mut self,
        id: usize,
        identifier: impl Into<String>,
    ) -> MutationResult<Arc<DocPartIndex>> {
        let identifier = identifier.into();
        let slot = self
            .added_mutable_indexes
            .iter()
            .position(|index| index.id() == id);
        let Some(slot) = slot else {
            panic!(
                "doc part {} has no in-progress index with id {}",
                self.identifier(),
                id
            );
        };
        if self.index_by_identifier(&identifier).is_some() {
            return Err(MutationError::DuplicateDocPartIndex {
                doc_part: self.identifier().to_string(),
                identifier,
            });
        }
        let old_state = self
            .indexes_by_identifier
            .get(&identifier)
            .map_or(ElementState::NotExistent, |(_, state)| *state);
        old_state.assert_legal_transition(ElementState::Added);

        let frozen = Arc::new(self.added_mutable_indexes[slot].freeze(&identifier));
        self.added_mutable_indexes.remove(slot);
        self.indexes_by_identifier
            .insert(identifier, (frozen.clone(), ElementState::Added));
        self.dirty = true;
        Ok(frozen)
    }

    /// Marks an identified physical index as removed. Returns false when
    /// no alive index carries the identifier.
    pub fn remove_doc_part_index_by_identifier(&mut self, identifier: &str) -> bool {
        let Some((_, state)) = self.indexes_by_identifier.get_mut(identifier) else {
            return false;
        };
        if !state.is_alive() {
            return false;
        }
        state.assert_legal_transition(ElementState::Removed);
        *state = ElementState::Removed;
        self.dirty = true;
        true
    }

    /// Alive identified physical indexes.
    pub fn indexes(&self) -> impl Iterator<Item = &Arc<DocPartIndex>> {
        self.indexes_by_identifier
            .values()
            .filter(|(_, state)| state.is_alive())
            .map(|(index, _)| index)
    }

    pub fn index_by_identifier(&self, identifier: &str) -> Option<&Arc<DocPartIndex>> {
        self.indexes_by_identifier
            .get(identifier)
            .filter(|(_, state)| state.is_alive())
            .map(|(index, _)| index)
    }

    /// Identified physical indexes that diverge from the wrapped doc
    /// part, with their change state.
    pub fn modified_indexes(&self) -> impl Iterator<Item = (&Arc<DocPartIndex>, ElementState)> {
        self.indexes_by_identifier
            .values()
            .filter(|(_, state)| state.is_changed())
            .map(|(index, state)| (index, *state))
    }

    /// Finds or opens an in-progress index able to realize one missing
    /// combination of a logical index, then assigns the new field's
    /// column. Columns for fields added earlier in this view stay
    /// unassigned until their own turn. Returns the in-progress index id.
    pub fn get_or_create_partial_doc_part_index(
        &mut self,
        missing_index: &impl IndexView,
        identifiers: &[String],
        new_field: &Field,
    ) -> MutationResult<usize> {
        let Some(position) = identifiers
            .iter()
            .position(|identifier| identifier == new_field.identifier())
        else {
            panic!(
                "field {} is not part of the identifier combination",
                new_field.identifier()
            );
        };
        let position = position as u32;
        let table_ref = self.table_ref().clone();

        // An in-progress index only qualifies if taking it does not
        // steal the sole remaining slot of another combination: every
        // unassigned position besides ours must belong to a field added
        // in this view, whose column is assigned later.
        let existing = self
            .added_mutable_indexes
            .iter()
            .find(|candidate| {
                candidate.column_by_position(position).is_none()
                    && identifiers.len() >= candidate.num_columns()
                    && missing_index.is_sub_match(self, identifiers, *candidate)
                    && self.unassigned_columns_are_added_fields(position, candidate, identifiers)
            })
            .map(MutableDocPartIndex::id);

        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.add_doc_part_index(missing_index.is_unique());
                for (local, identifier) in identifiers.iter().enumerate() {
                    if self.added_field_by_identifier(identifier).is_none() {
                        let ordering =
                            self.ordering_at(missing_index, &table_ref, local as u32);
                        if let Some(index) = self.added_index_mut(id) {
                            index.put_column(local as u32, identifier.clone(), ordering)?;
                        }
                    }
                }
                id
            }
        };

        let ordering = self.ordering_at(missing_index, &table_ref, position);
        if let Some(index) = self.added_index_mut(id) {
            index.put_column(position, new_field.identifier(), ordering)?;
        }
        Ok(id)
    }

    fn ordering_at(
        &self,
        index: &impl IndexView,
        table_ref: &TableRef,
        position: u32,
    ) -> FieldIndexOrdering {
        match index.field_at_local_position(table_ref, position) {
            Some(field) => field.ordering(),
            None => panic!(
                "index {} has no field at position {} for '{}'",
                index.name(),
                position,
                table_ref
            ),
        }
    }

    fn unassigned_columns_are_added_fields(
        &self,
        position: u32,
        candidate: &MutableDocPartIndex,
        identifiers: &[String],
    ) -> bool {
        !identifiers.iter().enumerate().any(|(other, identifier)| {
            other as u32 != position
                && candidate.column_by_position(other as u32).is_none()
                && self.added_field_by_identifier(identifier).is_none()
        })
    }

    /// Freezes this view. Untouched views hand back the wrapped doc
    /// part, preserving pointer identity.
    pub fn immutable_copy(&self) -> Arc<DocPart> {
        if !self.dirty {
            return self.wrapped.clone();
        }
        let mut builder = DocPartBuilder::new(
            self.wrapped.table_ref().clone(),
            self.wrapped.identifier(),
        );
        for field in self.wrapped.fields() {
            builder = builder.put_field(field.clone());
        }
        for field in &self.added_fields {
            builder = builder.put_field(field.clone());
        }
        for scalar in self.wrapped.scalars() {
            builder = builder.put_scalar(scalar.clone());
        }
        for scalar in self.new_scalars.values() {
            builder = builder.put_scalar(scalar.clone());
        }
        for (index, state) in self.indexes_by_identifier.values() {
            if state.is_alive() {
                builder = builder.put_index(index.clone());
            }
        }
        builder.build()
    }
}

impl DocPartView for MutableDocPart {
    fn table_ref(&self) -> &TableRef {
        self.wrapped.table_ref()
    }

    fn identifier(&self) -> &str {
        self.wrapped.identifier()
    }

    fn fields(&self) -> Vec<&Field> {
        self.fields_by_name.values().flatten().collect()
    }

    fn field_by_identifier(&self, identifier: &str) -> Option<&Field> {
        self.fields_by_name
            .values()
            .flatten()
            .find(|field| field.identifier() == identifier)
    }

    fn field_by_name_and_type(&self, name: &str, field_type: FieldType) -> Option<&Field> {
        self.fields_by_name
            .get(name)?
            .iter()
            .find(|field| field.field_type() == field_type)
    }

    fn fields_by_name(&self, name: &str) -> Vec<&Field> {
        self.fields_by_name
            .get(name)
            .map(|fields| fields.iter().collect())
            .unwrap_or_default()
    }

    fn scalars(&self) -> Vec<&Scalar> {
        self.new_scalars
            .values()
            .chain(self.wrapped.scalars())
            .collect()
    }

    fn scalar_by_identifier(&self, identifier: &str) -> Option<&Scalar> {
        self.new_scalars
            .values()
            .find(|scalar| scalar.identifier() == identifier)
            .or_else(|| self.wrapped.scalar_by_identifier(identifier))
    }

    fn scalar_by_type(&self, field_type: FieldType) -> Option<&Scalar> {
        self.new_scalars
            .get(&field_type)
            .or_else(|| self.wrapped.scalar_by_type(field_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IndexBuilder, IndexField};

    fn empty_root() -> MutableDocPart {
        MutableDocPart::new(DocPartBuilder::new(TableRef::root(), "doc_part_root").build())
    }

    #[test]
    fn test_add_field_rejects_same_name_and_type() {
        let mut doc_part = empty_root();
        doc_part
            .add_field("age", "age_i", FieldType::Integer)
            .unwrap();
        let err = doc_part
            .add_field("age", "age_i2", FieldType::Integer)
            .unwrap_err();
        assert!(matches!(err, MutationError::DuplicateField { .. }));
        // Same name with a new storage type is a new column.
        doc_part
            .add_field("age", "age_s", FieldType::String)
            .unwrap();
        assert_eq!(doc_part.fields_by_name("age").len(), 2);
    }

    #[test]
    fn test_add_field_rejects_taken_identifier() {
        let mut doc_part = empty_root();
        doc_part
            .add_field("a", "x_i", FieldType::Integer)
            .unwrap();
        let err = doc_part
            .add_field("b", "x_i", FieldType::String)
            .unwrap_err();
        assert!(matches!(err, MutationError::DuplicateFieldIdentifier { .. }));
        // The rejected field must not reach the visible field set.
        assert_eq!(doc_part.fields().len(), 1);
        assert!(doc_part.fields_by_name("b").is_empty());
        assert_eq!(doc_part.field_by_identifier("x_i").unwrap().name(), "a");
    }

    #[test]
    fn test_untouched_view_keeps_identity() {
        let wrapped = DocPartBuilder::new(TableRef::root(), "doc_part_root").build();
        let mut doc_part = MutableDocPart::new(wrapped.clone());
        assert!(Arc::ptr_eq(&doc_part.immutable_copy(), &wrapped));

        // Opening an in-progress index alone is not a change.
        doc_part.add_doc_part_index(false);
        assert!(!doc_part.has_changed());
        assert!(Arc::ptr_eq(&doc_part.immutable_copy(), &wrapped));
    }

    #[test]
    fn test_identify_registers_added_index() {
        let mut doc_part = empty_root();
        doc_part
            .add_field("a", "a_i", FieldType::Integer)
            .unwrap();
        let id = doc_part.add_doc_part_index(false);
        doc_part
            .added_index_mut(id)
            .unwrap()
            .add_column("a_i", FieldIndexOrdering::Ascending);
        let frozen = doc_part.identify_doc_part_index(id, "idx_1").unwrap();
        assert_eq!(frozen.identifier(), "idx_1");
        assert!(doc_part.index_by_identifier("idx_1").is_some());
        assert!(doc_part.added_index(id).is_none());
        let modified: Vec<_> = doc_part.modified_indexes().collect();
        assert!(modified
            .iter()
            .any(|(index, state)| index.identifier() == "idx_1" && *state == ElementState::Added));
    }

    #[test]
    fn test_identify_rejects_duplicate_identifier() {
        let mut doc_part = empty_root();
        let first = doc_part.add_doc_part_index(false);
        doc_part
            .added_index_mut(first)
            .unwrap()
            .add_column("a_i", FieldIndexOrdering::Ascending);
        doc_part.identify_doc_part_index(first, "idx_1").unwrap();

        let second = doc_part.add_doc_part_index(false);
        doc_part
            .added_index_mut(second)
            .unwrap()
            .add_column("b_i", FieldIndexOrdering::Ascending);
        let err = doc_part
            .identify_doc_part_index(second, "idx_1")
            .unwrap_err();
        assert!(matches!(err, MutationError::DuplicateDocPartIndex { .. }));
    }

    #[test]
    fn test_remove_index() {
        let wrapped = {
            use crate::catalog::{DocPartIndexBuilder, DocPartIndexColumn};
            DocPartBuilder::new(TableRef::root(), "doc_part_root")
                .put_index(Arc::new(
                    DocPartIndexBuilder::new("idx_1", false)
                        .add_column(DocPartIndexColumn::new(
                            0,
                            "a_i",
                            FieldIndexOrdering::Ascending,
                        ))
                        .build(),
                ))
                .build()
        };
        let mut doc_part = MutableDocPart::new(wrapped);
        assert!(doc_part.remove_doc_part_index_by_identifier("idx_1"));
        assert!(doc_part.index_by_identifier("idx_1").is_none());
        // Second removal is a no-op.
        assert!(!doc_part.remove_doc_part_index_by_identifier("idx_1"));
        assert_eq!(doc_part.immutable_copy().indexes().count(), 0);
    }

    #[test]
    fn test_partial_index_reuse_across_combinations() {
        // One stored field, one new field, a two-field logical index.
        let wrapped = DocPartBuilder::new(TableRef::root(), "doc_part_root")
            .put_field(Field::new("a", "a_i", FieldType::Integer))
            .build();
        let mut doc_part = MutableDocPart::new(wrapped);
        let new_field = doc_part
            .add_field("b", "b_i", FieldType::Integer)
            .unwrap();

        let index = IndexBuilder::new("idx", false)
            .add_field(IndexField::new(
                0,
                TableRef::root(),
                "a",
                FieldIndexOrdering::Ascending,
            ))
            .add_field(IndexField::new(
                1,
                TableRef::root(),
                "b",
                FieldIndexOrdering::Ascending,
            ))
            .build();

        let identifiers = vec!["a_i".to_string(), "b_i".to_string()];
        let id = doc_part
            .get_or_create_partial_doc_part_index(&index, &identifiers, &new_field)
            .unwrap();
        let partial = doc_part.added_index(id).unwrap();
        // The stored field was seeded at its position, the new one set.
        assert_eq!(partial.column_by_position(0).unwrap().identifier(), "a_i");
        assert_eq!(partial.column_by_position(1).unwrap().identifier(), "b_i");

        doc_part.identify_doc_part_index(id, "idx_phys").unwrap();
        assert!(doc_part.index_by_identifier("idx_phys").is_some());
    }
}
