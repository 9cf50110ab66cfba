//! Doc parts: the relational tables document trees are shredded into.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::doc_part_index::DocPartIndex;
use super::{Field, FieldType, Scalar, TableRef};

/// Read capability shared by immutable and mutable doc parts.
///
/// The index matching algorithm resolves index fields against doc parts
/// through this trait, so it works the same on a committed snapshot and
/// on an in-progress mutation.
pub trait DocPartView {
    fn table_ref(&self) -> &TableRef;

    fn identifier(&self) -> &str;

    /// All stored fields.
    fn fields(&self) -> Vec<&Field>;

    fn field_by_identifier(&self, identifier: &str) -> Option<&Field>;

    fn field_by_name_and_type(&self, name: &str, field_type: FieldType) -> Option<&Field>;

    /// All fields sharing a document-facing name, one per storage type.
    fn fields_by_name(&self, name: &str) -> Vec<&Field>;

    fn scalars(&self) -> Vec<&Scalar>;

    fn scalar_by_identifier(&self, identifier: &str) -> Option<&Scalar>;

    fn scalar_by_type(&self, field_type: FieldType) -> Option<&Scalar>;

    fn has_scalars(&self) -> bool {
        !self.scalars().is_empty()
    }
}

/// An immutable doc part: one table of a collection, holding the columns
/// and physical indexes for one path of the document tree.
#[derive(Debug)]
pub struct DocPart {
    table_ref: TableRef,
    identifier: String,
    fields: Vec<Field>,
    /// Slot into `fields` per column identifier.
    field_slots_by_identifier: HashMap<String, usize>,
    scalars: Vec<Scalar>,
    indexes: Vec<Arc<DocPartIndex>>,
}

impl DocPart {
    pub fn indexes(&self) -> impl Iterator<Item = &Arc<DocPartIndex>> {
        self.indexes.iter()
    }

    pub fn index_by_identifier(&self, identifier: &str) -> Option<&Arc<DocPartIndex>> {
        self.indexes
            .iter()
            .find(|index| index.identifier() == identifier)
    }
}

impl DocPartView for DocPart {
    fn table_ref(&self) -> &TableRef {
        &self.table_ref
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn fields(&self) -> Vec<&Field> {
        self.fields.iter().collect()
    }

    fn field_by_identifier(&self, identifier: &str) -> Option<&Field> {
        self.field_slots_by_identifier
            .get(identifier)
            .map(|&slot| &self.fields[slot])
    }

    fn field_by_name_and_type(&self, name: &str, field_type: FieldType) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name() == name && field.field_type() == field_type)
    }

    fn fields_by_name(&self, name: &str) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|field| field.name() == name)
            .collect()
    }

    fn scalars(&self) -> Vec<&Scalar> {
        self.scalars.iter().collect()
    }

    fn scalar_by_identifier(&self, identifier: &str) -> Option<&Scalar> {
        self.scalars
            .iter()
            .find(|scalar| scalar.identifier() == identifier)
    }

    fn scalar_by_type(&self, field_type: FieldType) -> Option<&Scalar> {
        self.scalars
            .iter()
            .find(|scalar| scalar.field_type() == field_type)
    }
}

impl fmt::Display for DocPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc part {} at '{}'", self.identifier, self.table_ref)
    }
}

/// Single-use builder for [`DocPart`]. Uniqueness of identifiers and of
/// (name, type) pairs is enforced by the mutable layer before anything
/// reaches a builder.
pub struct DocPartBuilder {
    table_ref: TableRef,
    identifier: String,
    fields: Vec<Field>,
    scalars: Vec<Scalar>,
    indexes: Vec<Arc<DocPartIndex>>,
}

impl DocPartBuilder {
    pub fn new(table_ref: TableRef, identifier: impl Into<String>) -> DocPartBuilder {
        DocPartBuilder {
            table_ref,
            identifier: identifier.into(),
            fields: Vec::new(),
            scalars: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn from_doc_part(other: &DocPart) -> DocPartBuilder {
        DocPartBuilder {
            table_ref: other.table_ref.clone(),
            identifier: other.identifier.clone(),
            fields: other.fields.clone(),
            scalars: other.scalars.clone(),
            indexes: other.indexes.clone(),
        }
    }

    pub fn put_field(mut self, field: Field) -> DocPartBuilder {
        self.fields.push(field);
        self
    }

    pub fn put_scalar(mut self, scalar: Scalar) -> DocPartBuilder {
        self.scalars.push(scalar);
        self
    }

    /// Adds a physical index, replacing any previous one with the same
    /// identifier.
    pub fn put_index(mut self, index: Arc<DocPartIndex>) -> DocPartBuilder {
        self.indexes
            .retain(|existing| existing.identifier() != index.identifier());
        self.indexes.push(index);
        self
    }

    pub fn remove_index(mut self, identifier: &str) -> DocPartBuilder {
        self.indexes
            .retain(|existing| existing.identifier() != identifier);
        self
    }

    pub fn build(self) -> Arc<DocPart> {
        let field_slots_by_identifier = self
            .fields
            .iter()
            .enumerate()
            .map(|(slot, field)| (field.identifier().to_string(), slot))
            .collect();
        Arc::new(DocPart {
            table_ref: self.table_ref,
            identifier: self.identifier,
            fields: self.fields,
            field_slots_by_identifier,
            scalars: self.scalars,
            indexes: self.indexes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Arc<DocPart> {
        DocPartBuilder::new(TableRef::root(), "doc_part_1")
            .put_field(Field::new("age", "age_i", FieldType::Integer))
            .put_field(Field::new("age", "age_s", FieldType::String))
            .put_field(Field::new("name", "name_s", FieldType::String))
            .build()
    }

    #[test]
    fn test_fields_by_name_groups_storage_types() {
        let doc_part = sample();
        let mut types: Vec<_> = doc_part
            .fields_by_name("age")
            .iter()
            .map(|field| field.field_type())
            .collect();
        types.sort();
        assert_eq!(types, vec![FieldType::Integer, FieldType::String]);
        assert!(doc_part.fields_by_name("missing").is_empty());
    }

    #[test]
    fn test_lookups() {
        let doc_part = sample();
        assert_eq!(
            doc_part
                .field_by_name_and_type("age", FieldType::Integer)
                .map(Field::identifier),
            Some("age_i")
        );
        assert!(doc_part
            .field_by_name_and_type("age", FieldType::Double)
            .is_none());
        assert!(doc_part.field_by_identifier("name_s").is_some());
        assert!(!doc_part.has_scalars());
    }

    #[test]
    fn test_scalar_lookup() {
        let tags = TableRef::child(TableRef::root(), "tags");
        let doc_part = DocPartBuilder::new(tags, "doc_part_tags")
            .put_scalar(Scalar::new("v_s", FieldType::String))
            .put_scalar(Scalar::new("v_i", FieldType::Integer))
            .build();
        assert!(doc_part.has_scalars());
        assert_eq!(
            doc_part
                .scalar_by_type(FieldType::Integer)
                .map(Scalar::identifier),
            Some("v_i")
        );
        assert!(doc_part.scalar_by_identifier("v_d").is_none());
    }
}
