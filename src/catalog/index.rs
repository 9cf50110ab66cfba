//! Logical document-level indexes and the index matching algorithm.
//!
//! A logical index spans one or more doc parts (denormalized nesting);
//! it is physically realized as one doc part index per referenced doc
//! part. The predicates here decide whether an index is realizable over a
//! doc part, whether a physical index satisfies part of a logical one,
//! and which column-identifier combinations a logical index can resolve
//! to. They are pure functions over the entity graph; the pairwise
//! consumption and simultaneous-exhaustion rules must not be relaxed.

use std::fmt;

use super::doc_part::DocPartView;
use super::doc_part_index::{DocPartIndexColumn, DocPartIndexView};
use super::{FieldIndexOrdering, TableRef};

/// One field of a logical index: a position in the index, the doc part it
/// applies to, the document-facing field name and the ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexField {
    position: u32,
    table_ref: TableRef,
    name: String,
    ordering: FieldIndexOrdering,
}

impl IndexField {
    pub fn new(
        position: u32,
        table_ref: TableRef,
        name: impl Into<String>,
        ordering: FieldIndexOrdering,
    ) -> IndexField {
        IndexField {
            position,
            table_ref,
            name: name.into(),
            ordering,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn table_ref(&self) -> &TableRef {
        &self.table_ref
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ordering(&self) -> FieldIndexOrdering {
        self.ordering
    }

    /// Whether the doc part can carry this index field: it has a field
    /// with the same name, or — on a non-root doc part whose path name
    /// equals this field's name — an array-element scalar.
    pub fn is_compatible(&self, doc_part: &impl DocPartView) -> bool {
        !doc_part.fields_by_name(&self.name).is_empty()
            || (!self.table_ref.is_root()
                && self.table_ref.name() == self.name
                && doc_part.has_scalars())
    }

    /// Whether a concrete index column can stand for this index field on
    /// the given doc part.
    pub fn is_compatible_column(
        &self,
        doc_part: &impl DocPartView,
        column: &DocPartIndexColumn,
    ) -> bool {
        if self.ordering != column.ordering() {
            return false;
        }
        if let Some(field) = doc_part.field_by_identifier(column.identifier()) {
            return field.name() == self.name;
        }
        if doc_part.scalar_by_identifier(column.identifier()).is_some() {
            return !self.table_ref.is_root() && self.table_ref.name() == self.name;
        }
        false
    }

    /// Like [`is_compatible_column`](Self::is_compatible_column), but the
    /// column must additionally carry the given identifier.
    pub fn is_match_column(
        &self,
        doc_part: &impl DocPartView,
        identifier: &str,
        column: &DocPartIndexColumn,
    ) -> bool {
        column.identifier() == identifier && self.is_compatible_column(doc_part, column)
    }

    /// Positional equality with another index field.
    pub fn matches(&self, other: &IndexField) -> bool {
        self.position == other.position
            && self.table_ref == other.table_ref
            && self.name == other.name
            && self.ordering == other.ordering
    }
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {}", self.table_ref, self.name, self.ordering)
    }
}

/// Capability shared by immutable and mutable logical indexes; carries
/// the matching algorithm as provided methods.
pub trait IndexView {
    fn name(&self) -> &str;

    fn is_unique(&self) -> bool;

    /// Total number of index fields across all doc parts.
    fn num_fields(&self) -> usize;

    /// All fields, in position order.
    fn fields(&self) -> Vec<&IndexField>;

    /// The fields applying to one doc part, in position order.
    fn fields_by_table_ref(&self, table_ref: &TableRef) -> Vec<&IndexField>;

    fn field_by_position(&self, position: u32) -> Option<&IndexField>;

    fn field_by_table_ref_and_name(&self, table_ref: &TableRef, name: &str)
        -> Option<&IndexField>;

    /// The index field at the given position among this index's fields
    /// for one doc part; column positions in a doc part index are local
    /// to the doc part.
    fn field_at_local_position(&self, table_ref: &TableRef, position: u32) -> Option<&IndexField> {
        self.fields_by_table_ref(table_ref)
            .get(position as usize)
            .copied()
    }

    /// Doc parts referenced by this index, without duplicates.
    fn table_refs(&self) -> Vec<&TableRef> {
        let mut refs: Vec<&TableRef> = Vec::new();
        for field in self.fields() {
            if !refs.contains(&field.table_ref()) {
                refs.push(field.table_ref());
            }
        }
        refs
    }

    /// Whether this index is realizable over the given doc part: it has
    /// at least one field for that doc part and every such field is
    /// compatible.
    fn is_compatible_with(&self, doc_part: &impl DocPartView) -> bool {
        let fields = self.fields_by_table_ref(doc_part.table_ref());
        !fields.is_empty() && fields.iter().all(|field| field.is_compatible(doc_part))
    }

    /// Whether the given doc part index satisfies this index's portion on
    /// the doc part: uniqueness flags agree and fields and columns pair
    /// up one to one, both sequences exhausted together.
    fn is_compatible_with_index(
        &self,
        doc_part: &impl DocPartView,
        doc_part_index: &impl DocPartIndexView,
    ) -> bool {
        if self.is_unique() != doc_part_index.is_unique() {
            return false;
        }
        let fields = self.fields_by_table_ref(doc_part.table_ref());
        if fields.is_empty() {
            return false;
        }
        let columns = doc_part_index.columns();
        let mut fi = 0;
        let mut ci = 0;
        while fi < fields.len() && ci < columns.len() {
            if !fields[fi].is_compatible_column(doc_part, columns[ci]) {
                return false;
            }
            fi += 1;
            ci += 1;
        }
        fi == fields.len() && ci == columns.len()
    }

    /// Whether the doc part index realizes exactly the given
    /// column-identifier combination of this index on the doc part.
    fn is_match(
        &self,
        doc_part: &impl DocPartView,
        identifiers: &[String],
        doc_part_index: &impl DocPartIndexView,
    ) -> bool {
        self.matches_columns(doc_part, identifiers, doc_part_index, false)
    }

    /// Relaxed [`is_match`](Self::is_match) for an index still being
    /// built: unassigned columns are tolerated, but every assigned one
    /// must match. An empty candidate list matches trivially; downstream
    /// index-assignment logic relies on that.
    fn is_sub_match(
        &self,
        doc_part: &impl DocPartView,
        identifiers_sublist: &[String],
        doc_part_index: &impl DocPartIndexView,
    ) -> bool {
        self.matches_columns(doc_part, identifiers_sublist, doc_part_index, true)
    }

    #[doc(hidden)]
    fn matches_columns(
        &self,
        doc_part: &impl DocPartView,
        identifiers: &[String],
        doc_part_index: &impl DocPartIndexView,
        sub_match: bool,
    ) -> bool {
        if self.is_unique() != doc_part_index.is_unique() {
            return false;
        }
        let fields = self.fields_by_table_ref(doc_part.table_ref());
        if fields.is_empty() {
            return false;
        }
        if sub_match && identifiers.is_empty() {
            return true;
        }

        let columns = doc_part_index.columns();
        let mut fi = 0;
        let mut ci = 0;
        let mut ii = 0;
        while fi < fields.len() && (sub_match || ci < columns.len()) && ii < identifiers.len() {
            let field = fields[fi];
            fi += 1;
            let column = if ci < columns.len() {
                let column = columns[ci];
                ci += 1;
                Some(column)
            } else {
                None
            };
            let identifier = &identifiers[ii];
            ii += 1;
            match column {
                Some(column) => {
                    if !field.is_match_column(doc_part, identifier, column) {
                        return false;
                    }
                }
                None => {
                    if !sub_match {
                        return false;
                    }
                }
            }
        }

        (sub_match || (fi == fields.len() && ci == columns.len())) && ii == identifiers.len()
    }

    /// Whether two logical indexes denote the same index: same name, or
    /// same uniqueness and size with positionally matching fields. Used
    /// to detect rename/redefinition conflicts.
    fn matches_index(&self, other: &impl IndexView) -> bool {
        if self.name() == other.name() {
            return true;
        }
        other.is_unique() == self.is_unique()
            && other.num_fields() == self.num_fields()
            && self.fields().iter().all(|field| {
                other
                    .field_by_position(field.position())
                    .is_some_and(|other_field| field.matches(other_field))
            })
    }

    /// Every column-identifier combination that could realize this index
    /// on the doc part: the cartesian product, across this index's
    /// fields for the doc part, of all stored fields sharing each name.
    fn doc_part_index_identifiers(&self, doc_part: &impl DocPartView) -> Vec<Vec<String>> {
        let mut combinations: Vec<Vec<String>> = Vec::new();
        for index_field in self.fields_by_table_ref(doc_part.table_ref()) {
            let named = doc_part.fields_by_name(index_field.name());
            cartesian_append(&mut combinations, &named);
        }
        combinations
    }
}

/// Extends each combination with every identifier in `fields`, growing
/// the set multiplicatively. An empty `fields` list contributes nothing.
fn cartesian_append(combinations: &mut Vec<Vec<String>>, fields: &[&super::Field]) {
    if fields.is_empty() {
        return;
    }

    if combinations.is_empty() {
        for field in fields {
            combinations.push(vec![field.identifier().to_string()]);
        }
        return;
    }

    let mut expanded = Vec::with_capacity(combinations.len() * fields.len());
    for combination in combinations.iter() {
        for field in fields {
            let mut extended = combination.clone();
            extended.push(field.identifier().to_string());
            expanded.push(extended);
        }
    }
    *combinations = expanded;
}

/// An immutable logical index.
#[derive(Debug)]
pub struct Index {
    name: String,
    unique: bool,
    fields_by_position: Vec<IndexField>,
}

impl IndexView for Index {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_unique(&self) -> bool {
        self.unique
    }

    fn num_fields(&self) -> usize {
        self.fields_by_position.len()
    }

    fn fields(&self) -> Vec<&IndexField> {
        self.fields_by_position.iter().collect()
    }

    fn fields_by_table_ref(&self, table_ref: &TableRef) -> Vec<&IndexField> {
        self.fields_by_position
            .iter()
            .filter(|field| field.table_ref() == table_ref)
            .collect()
    }

    fn field_by_position(&self, position: u32) -> Option<&IndexField> {
        self.fields_by_position.get(position as usize)
    }

    fn field_by_table_ref_and_name(
        &self,
        table_ref: &TableRef,
        name: &str,
    ) -> Option<&IndexField> {
        self.fields_by_position
            .iter()
            .find(|field| field.table_ref() == table_ref && field.name() == name)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} ({} fields)",
            self.name,
            if self.unique { " unique" } else { "" },
            self.fields_by_position.len()
        )
    }
}

/// Single-use builder for [`Index`].
pub struct IndexBuilder {
    name: String,
    unique: bool,
    fields: Vec<IndexField>,
}

impl IndexBuilder {
    pub fn new(name: impl Into<String>, unique: bool) -> IndexBuilder {
        IndexBuilder {
            name: name.into(),
            unique,
            fields: Vec::new(),
        }
    }

    pub fn from_index(other: &Index) -> IndexBuilder {
        IndexBuilder {
            name: other.name.clone(),
            unique: other.unique,
            fields: other.fields_by_position.clone(),
        }
    }

    pub fn add_field(mut self, field: IndexField) -> IndexBuilder {
        self.fields.push(field);
        self
    }

    pub fn build(mut self) -> Index {
        self.fields.sort_by_key(IndexField::position);
        Index {
            name: self.name,
            unique: self.unique,
            fields_by_position: self.fields,
        }
    }
}
