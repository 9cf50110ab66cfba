//! Logical indexes under construction.

use std::sync::Arc;

use crate::catalog::{
    FieldIndexOrdering, Index, IndexBuilder, IndexField, IndexView, TableRef,
};

use super::errors::{MutationError, MutationResult};

/// A mutable view over a logical index, accumulating fields in
/// declaration order.
///
/// Committed indexes are wrapped read-mostly; a brand new index starts
/// empty. Whether fields were added since the view opened is exposed
/// through [`has_changed`](Self::has_changed), which the owning
/// collection polls to derive change states.
#[derive(Debug)]
pub struct MutableIndex {
    wrapped: Option<Arc<Index>>,
    name: String,
    unique: bool,
    fields: Vec<IndexField>,
    /// Number of fields seeded from the wrapped index; everything past
    /// this offset was added through this view.
    wrapped_len: usize,
    dirty: bool,
}

impl MutableIndex {
    pub(crate) fn new(name: impl Into<String>, unique: bool) -> MutableIndex {
        MutableIndex {
            wrapped: None,
            name: name.into(),
            unique,
            fields: Vec::new(),
            wrapped_len: 0,
            dirty: false,
        }
    }

    pub(crate) fn from_index(wrapped: Arc<Index>) -> MutableIndex {
        let fields: Vec<IndexField> = wrapped.fields().into_iter().cloned().collect();
        MutableIndex {
            name: wrapped.name().to_string(),
            unique: wrapped.is_unique(),
            wrapped_len: fields.len(),
            fields,
            wrapped: Some(wrapped),
            dirty: false,
        }
    }

    /// Fields added through this view, in declaration order.
    pub fn added_fields(&self) -> impl Iterator<Item = &IndexField> {
        self.fields[self.wrapped_len..].iter()
    }

    /// Whether fields were added since this view was opened.
    pub fn has_changed(&self) -> bool {
        self.dirty
    }

    /// Appends a field at the next position. At most one field per
    /// (doc part, name) pair is allowed.
    pub fn add_field(
        &mut self,
        table_ref: TableRef,
        name: impl Into<String>,
        ordering: FieldIndexOrdering,
    ) -> MutationResult<&IndexField> {
        let name = name.into();
        if self.field_by_table_ref_and_name(&table_ref, &name).is_some() {
            return Err(MutationError::DuplicateIndexField {
                index: self.name.clone(),
                table_ref: table_ref.to_string(),
                name,
            });
        }
        let position = self.fields.len() as u32;
        self.fields
            .push(IndexField::new(position, table_ref, name, ordering));
        self.dirty = true;
        Ok(self.fields.last().unwrap())
    }

    /// Freezes the view. An untouched wrapped index is returned as is,
    /// keeping pointer identity with the base snapshot.
    pub fn immutable_copy(&self) -> Arc<Index> {
        if !self.dirty {
            if let Some(wrapped) = &self.wrapped {
                return wrapped.clone();
            }
        }
        let mut builder = IndexBuilder::new(&self.name, self.unique);
        for field in &self.fields {
            builder = builder.add_field(field.clone());
        }
        Arc::new(builder.build())
    }
}

impl IndexView for MutableIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_unique(&self) -> bool {
        self.unique
    }

    fn num_fields(&self) -> usize {
        self.fields.len()
    }

    fn fields(&self) -> Vec<&IndexField> {
        self.fields.iter().collect()
    }

    fn fields_by_table_ref(&self, table_ref: &TableRef) -> Vec<&IndexField> {
        self.fields
            .iter()
            .filter(|field| field.table_ref() == table_ref)
            .collect()
    }

    fn field_by_position(&self, position: u32) -> Option<&IndexField> {
        self.fields.get(position as usize)
    }

    fn field_by_table_ref_and_name(
        &self,
        table_ref: &TableRef,
        name: &str,
    ) -> Option<&IndexField> {
        self.fields
            .iter()
            .find(|field| field.table_ref() == table_ref && field.name() == name)
    }
}
