//! Error types for catalog mutation.

use thiserror::Error;

use crate::catalog::FieldType;

/// Result type for mutation operations
pub type MutationResult<T> = Result<T, MutationError>;

/// Rejected catalog mutations.
///
/// Every variant is a uniqueness violation: the mutable views refuse to
/// create an element whose key is already taken at its level.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("database {name} already exists")]
    DuplicateDatabase { name: String },

    #[error("database identifier {identifier} is already in use")]
    DuplicateDatabaseIdentifier { identifier: String },

    #[error("collection {name} already exists in database {database}")]
    DuplicateCollection { database: String, name: String },

    #[error("collection identifier {identifier} is already in use in database {database}")]
    DuplicateCollectionIdentifier {
        database: String,
        identifier: String,
    },

    #[error("doc part at '{table_ref}' already exists in collection {collection}")]
    DuplicateDocPart {
        collection: String,
        table_ref: String,
    },

    #[error("doc part identifier {identifier} is already in use in collection {collection}")]
    DuplicateDocPartIdentifier {
        collection: String,
        identifier: String,
    },

    #[error("field {name} of type {field_type} already exists in doc part {doc_part}")]
    DuplicateField {
        doc_part: String,
        name: String,
        field_type: FieldType,
    },

    #[error("field identifier {identifier} is already in use in doc part {doc_part}")]
    DuplicateFieldIdentifier {
        doc_part: String,
        identifier: String,
    },

    #[error("scalar of type {field_type} already exists in doc part {doc_part}")]
    DuplicateScalar {
        doc_part: String,
        field_type: FieldType,
    },

    #[error("index {name} already exists in collection {collection}")]
    DuplicateIndex { collection: String, name: String },

    #[error("doc part index {identifier} already exists in doc part {doc_part}")]
    DuplicateDocPartIndex {
        doc_part: String,
        identifier: String,
    },

    #[error("index {index} already has a field for '{table_ref}' named {name}")]
    DuplicateIndexField {
        index: String,
        table_ref: String,
        name: String,
    },

    #[error("doc part index {identifier} already has a column at position {position}")]
    ColumnPositionInUse { identifier: String, position: u32 },
}
