//! Immutable metadata entities.
//!
//! The catalog is a tree of immutable values: a snapshot holds databases,
//! a database holds collections, a collection holds doc parts and logical
//! indexes, and a doc part holds fields, scalars and physical indexes.
//! Entities above the leaf level are shared through `Arc`, so rebuilding
//! a snapshot reuses every unchanged subtree and pointer equality tells
//! whether a subtree changed at all.

mod collection;
mod database;
pub mod doc_part;
pub mod doc_part_index;
mod field;
mod field_type;
pub mod index;
mod snapshot;
mod table_ref;

pub use collection::{Collection, CollectionBuilder};
pub use database::{Database, DatabaseBuilder};
pub use doc_part::{DocPart, DocPartBuilder, DocPartView};
pub use doc_part_index::{
    has_same_columns, DocPartIndex, DocPartIndexBuilder, DocPartIndexColumn, DocPartIndexView,
};
pub use field::{Field, Scalar};
pub use field_type::{FieldIndexOrdering, FieldType};
pub use index::{Index, IndexBuilder, IndexField, IndexView};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use table_ref::TableRef;
