//! Physical indexes: the single-table realization of (part of) a logical
//! index on one doc part.

use std::fmt;

use super::FieldIndexOrdering;

/// One column of a physical doc part index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPartIndexColumn {
    position: u32,
    identifier: String,
    ordering: FieldIndexOrdering,
}

impl DocPartIndexColumn {
    pub fn new(
        position: u32,
        identifier: impl Into<String>,
        ordering: FieldIndexOrdering,
    ) -> DocPartIndexColumn {
        DocPartIndexColumn {
            position,
            identifier: identifier.into(),
            ordering,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn ordering(&self) -> FieldIndexOrdering {
        self.ordering
    }
}

/// Capability shared by finished and in-progress doc part indexes: a
/// uniqueness flag plus columns ordered by position.
///
/// The matching algorithm consumes columns through this trait so it can
/// run against either variant.
pub trait DocPartIndexView {
    fn is_unique(&self) -> bool;

    /// Assigned columns in position order. An in-progress index may have
    /// unassigned positions, in which case consecutive items of this
    /// sequence are not necessarily at consecutive positions.
    fn columns(&self) -> Vec<&DocPartIndexColumn>;

    fn column_by_position(&self, position: u32) -> Option<&DocPartIndexColumn>;

    /// Number of assigned columns.
    fn num_columns(&self) -> usize;
}

/// Returns whether two doc part indexes cover the same columns: equal
/// identifier and ordering at every position, consumed pairwise.
pub fn has_same_columns(a: &impl DocPartIndexView, b: &impl DocPartIndexView) -> bool {
    let left = a.columns();
    let right = b.columns();
    left.len() == right.len()
        && left
            .iter()
            .zip(right.iter())
            .all(|(l, r)| l.identifier() == r.identifier() && l.ordering() == r.ordering())
}

/// An identified, immutable physical index over one doc part.
///
/// Column positions are contiguous from 0; the builder enforces this.
#[derive(Debug)]
pub struct DocPartIndex {
    identifier: String,
    unique: bool,
    columns_by_position: Vec<DocPartIndexColumn>,
}

impl DocPartIndex {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn column_by_identifier(&self, identifier: &str) -> Option<&DocPartIndexColumn> {
        self.columns_by_position
            .iter()
            .find(|column| column.identifier() == identifier)
    }
}

impl DocPartIndexView for DocPartIndex {
    fn is_unique(&self) -> bool {
        self.unique
    }

    fn columns(&self) -> Vec<&DocPartIndexColumn> {
        self.columns_by_position.iter().collect()
    }

    fn column_by_position(&self, position: u32) -> Option<&DocPartIndexColumn> {
        self.columns_by_position.get(position as usize)
    }

    fn num_columns(&self) -> usize {
        self.columns_by_position.len()
    }
}

impl fmt::Display for DocPartIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index {} ({} columns)", self.identifier, self.columns_by_position.len())
    }
}

/// Single-use builder for [`DocPartIndex`]. `build()` consumes the
/// builder, so it cannot be reused.
pub struct DocPartIndexBuilder {
    identifier: String,
    unique: bool,
    columns: Vec<DocPartIndexColumn>,
}

impl DocPartIndexBuilder {
    pub fn new(identifier: impl Into<String>, unique: bool) -> DocPartIndexBuilder {
        DocPartIndexBuilder {
            identifier: identifier.into(),
            unique,
            columns: Vec::new(),
        }
    }

    /// Seeds the builder with an existing index for incremental rebuild.
    pub fn from_index(other: &DocPartIndex) -> DocPartIndexBuilder {
        DocPartIndexBuilder {
            identifier: other.identifier.clone(),
            unique: other.unique,
            columns: other.columns_by_position.clone(),
        }
    }

    pub fn add_column(mut self, column: DocPartIndexColumn) -> DocPartIndexBuilder {
        self.columns.push(column);
        self
    }

    /// Panics if column positions are not contiguous from 0; a caller
    /// that gets here with a gap has violated the mutation contract.
    pub fn build(mut self) -> DocPartIndex {
        self.columns.sort_by_key(DocPartIndexColumn::position);
        for (expected, column) in self.columns.iter().enumerate() {
            assert!(
                column.position() as usize == expected,
                "doc part index {} has a column gap at position {}",
                self.identifier,
                expected
            );
        }
        DocPartIndex {
            identifier: self.identifier,
            unique: self.unique,
            columns_by_position: self.columns,
        }
    }
}
