//! Hierarchical path identifying a doc part's position in the document tree.
//!
//! A `TableRef` is an opaque, cheaply-clonable key: the root document, a
//! named sub-document of a parent path, or a positional array level
//! (arrays directly inside arrays have no name of their own and are
//! identified by their nesting dimension).

use std::fmt;
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq, Hash)]
enum TableRefData {
    Root,
    Child {
        parent: TableRef,
        name: String,
    },
    ArrayChild {
        parent: TableRef,
        dimension: u32,
        /// Rendered name, `$<dimension>`. Precomputed so `name()` can
        /// return a borrow like the named variant does.
        name: String,
    },
}

/// Position of a doc part in the nested-document tree.
///
/// Equality and hashing are structural over the whole path, so a
/// `TableRef` can be used directly as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef(Arc<TableRefData>);

impl TableRef {
    /// The root document path.
    pub fn root() -> TableRef {
        TableRef(Arc::new(TableRefData::Root))
    }

    /// A named sub-document or array under `parent`.
    pub fn child(parent: TableRef, name: impl Into<String>) -> TableRef {
        TableRef(Arc::new(TableRefData::Child {
            parent,
            name: name.into(),
        }))
    }

    /// An anonymous array level under `parent`, at the given nesting
    /// dimension (2 for the first array-in-array level).
    pub fn array_child(parent: TableRef, dimension: u32) -> TableRef {
        TableRef(Arc::new(TableRefData::ArrayChild {
            parent,
            dimension,
            name: format!("${}", dimension),
        }))
    }

    pub fn is_root(&self) -> bool {
        matches!(*self.0, TableRefData::Root)
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<&TableRef> {
        match &*self.0 {
            TableRefData::Root => None,
            TableRefData::Child { parent, .. } => Some(parent),
            TableRefData::ArrayChild { parent, .. } => Some(parent),
        }
    }

    /// The path's own name: empty for the root, `$<n>` for array levels.
    pub fn name(&self) -> &str {
        match &*self.0 {
            TableRefData::Root => "",
            TableRefData::Child { name, .. } => name,
            TableRefData::ArrayChild { name, .. } => name,
        }
    }

    /// Number of edges from the root.
    pub fn depth(&self) -> usize {
        match self.parent() {
            None => 0,
            Some(parent) => parent.depth() + 1,
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            TableRefData::Root => Ok(()),
            TableRefData::Child { parent, name } | TableRefData::ArrayChild { parent, name, .. } => {
                if parent.is_root() {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{}.{}", parent, name)
                }
            }
        }
    }
}
