//! Collections: a named set of doc parts plus the logical indexes over them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::doc_part::DocPart;
use super::index::{Index, IndexView};
use super::TableRef;

/// An immutable collection. If it has any doc part at all, one of them
/// is the root doc part.
#[derive(Debug)]
pub struct Collection {
    name: String,
    identifier: String,
    doc_parts_by_ref: HashMap<TableRef, Arc<DocPart>>,
    doc_parts_by_identifier: HashMap<String, Arc<DocPart>>,
    indexes_by_name: HashMap<String, Arc<Index>>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn doc_parts(&self) -> impl Iterator<Item = &Arc<DocPart>> {
        self.doc_parts_by_ref.values()
    }

    pub fn doc_part_by_table_ref(&self, table_ref: &TableRef) -> Option<&Arc<DocPart>> {
        self.doc_parts_by_ref.get(table_ref)
    }

    pub fn doc_part_by_identifier(&self, identifier: &str) -> Option<&Arc<DocPart>> {
        self.doc_parts_by_identifier.get(identifier)
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Arc<Index>> {
        self.indexes_by_name.values()
    }

    pub fn index_by_name(&self, name: &str) -> Option<&Arc<Index>> {
        self.indexes_by_name.get(name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection {} ({})", self.name, self.identifier)
    }
}

/// Single-use builder for [`Collection`].
pub struct CollectionBuilder {
    name: String,
    identifier: String,
    doc_parts: Vec<Arc<DocPart>>,
    indexes: Vec<Arc<Index>>,
}

impl CollectionBuilder {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> CollectionBuilder {
        CollectionBuilder {
            name: name.into(),
            identifier: identifier.into(),
            doc_parts: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn from_collection(other: &Collection) -> CollectionBuilder {
        CollectionBuilder {
            name: other.name.clone(),
            identifier: other.identifier.clone(),
            doc_parts: other.doc_parts_by_ref.values().cloned().collect(),
            indexes: other.indexes_by_name.values().cloned().collect(),
        }
    }

    /// Adds a doc part, replacing any previous one at the same path.
    pub fn put_doc_part(mut self, doc_part: Arc<DocPart>) -> CollectionBuilder {
        use super::doc_part::DocPartView;
        self.doc_parts
            .retain(|existing| existing.table_ref() != doc_part.table_ref());
        self.doc_parts.push(doc_part);
        self
    }

    /// Adds an index, replacing any previous one with the same name.
    pub fn put_index(mut self, index: Arc<Index>) -> CollectionBuilder {
        self.indexes
            .retain(|existing| existing.name() != index.name());
        self.indexes.push(index);
        self
    }

    pub fn remove_index(mut self, name: &str) -> CollectionBuilder {
        self.indexes.retain(|existing| existing.name() != name);
        self
    }

    /// Panics if doc parts exist but none of them is the root; every
    /// non-empty collection hangs off a root doc part.
    pub fn build(self) -> Arc<Collection> {
        use super::doc_part::DocPartView;

        assert!(
            self.doc_parts.is_empty()
                || self
                    .doc_parts
                    .iter()
                    .any(|doc_part| doc_part.table_ref().is_root()),
            "collection {} has doc parts but no root doc part",
            self.name
        );
        let mut doc_parts_by_ref = HashMap::with_capacity(self.doc_parts.len());
        let mut doc_parts_by_identifier = HashMap::with_capacity(self.doc_parts.len());
        for doc_part in self.doc_parts {
            doc_parts_by_identifier.insert(doc_part.identifier().to_string(), doc_part.clone());
            doc_parts_by_ref.insert(doc_part.table_ref().clone(), doc_part);
        }
        Arc::new(Collection {
            name: self.name,
            identifier: self.identifier,
            doc_parts_by_ref,
            doc_parts_by_identifier,
            indexes_by_name: self
                .indexes
                .into_iter()
                .map(|index| (index.name().to_string(), index))
                .collect(),
        })
    }
}
