//! In-progress physical indexes.

use std::collections::BTreeMap;

use crate::catalog::{
    DocPartIndex, DocPartIndexBuilder, DocPartIndexColumn, DocPartIndexView, FieldIndexOrdering,
};

use super::errors::{MutationError, MutationResult};

/// A physical index under construction on a mutable doc part.
///
/// Columns may be assigned out of order while the index-resolution logic
/// discovers which stored field realizes each position; gaps are allowed
/// until the index is identified. It has no identifier yet: identifying
/// it (through the owning doc part) freezes it into a
/// [`DocPartIndex`] and requires contiguous columns.
#[derive(Debug)]
pub struct MutableDocPartIndex {
    id: usize,
    unique: bool,
    columns_by_position: BTreeMap<u32, DocPartIndexColumn>,
}

impl MutableDocPartIndex {
    pub(crate) fn new(id: usize, unique: bool) -> MutableDocPartIndex {
        MutableDocPartIndex {
            id,
            unique,
            columns_by_position: BTreeMap::new(),
        }
    }

    /// Id of this in-progress index within its doc part.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Assigns the column at an explicit position.
    pub fn put_column(
        &mut self,
        position: u32,
        identifier: impl Into<String>,
        ordering: FieldIndexOrdering,
    ) -> MutationResult<()> {
        let identifier = identifier.into();
        if self.columns_by_position.contains_key(&position) {
            return Err(MutationError::ColumnPositionInUse {
                identifier,
                position,
            });
        }
        self.columns_by_position
            .insert(position, DocPartIndexColumn::new(position, identifier, ordering));
        Ok(())
    }

    /// Appends a column right after the highest assigned position.
    pub fn add_column(&mut self, identifier: impl Into<String>, ordering: FieldIndexOrdering) {
        let position = self
            .columns_by_position
            .keys()
            .next_back()
            .map_or(0, |last| last + 1);
        self.columns_by_position
            .insert(position, DocPartIndexColumn::new(position, identifier.into(), ordering));
    }

    pub fn column_by_identifier(&self, identifier: &str) -> Option<&DocPartIndexColumn> {
        self.columns_by_position
            .values()
            .find(|column| column.identifier() == identifier)
    }

    /// Freezes into an immutable index under the given identifier.
    /// Panics if columns are not contiguous from position 0.
    pub(crate) fn freeze(&self, identifier: &str) -> DocPartIndex {
        let mut builder = DocPartIndexBuilder::new(identifier, self.unique);
        for column in self.columns_by_position.values() {
            builder = builder.add_column(column.clone());
        }
        builder.build()
    }
}

impl DocPartIndexView for MutableDocPartIndex {
    fn is_unique(&self) -> bool {
        self.unique
    }

    fn columns(&self) -> Vec<&DocPartIndexColumn> {
        self.columns_by_position.values().collect()
    }

    fn column_by_position(&self, position: u32) -> Option<&DocPartIndexColumn> {
        self.columns_by_position.get(&position)
    }

    fn num_columns(&self) -> usize {
        self.columns_by_position.len()
    }
}
