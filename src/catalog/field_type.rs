//! Storage types for document values and index column ordering.
//!
//! Every scalar value extracted from a document is stored in a relational
//! column of exactly one of these types. A document field name may repeat
//! with several storage types; each (name, type) pair is a distinct column.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type of a field or scalar column.
///
/// `Child` marks a nested structure (sub-document or array) whose values
/// live in a child doc part rather than in a column of this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Boolean
    Boolean,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Long,
    /// 64-bit floating point
    Double,
    /// UTF-8 string
    String,
    /// Calendar date without time of day
    Date,
    /// Time of day without date
    Time,
    /// Point on the time line
    Instant,
    /// Opaque byte string
    Binary,
    /// Driver-generated object id
    ObjectId,
    /// Internal oplog timestamp
    Timestamp,
    /// Explicit null value
    Null,
    /// Nested sub-document or array, stored in a child doc part
    Child,
}

impl FieldType {
    /// Returns the type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Instant => "instant",
            FieldType::Binary => "binary",
            FieldType::ObjectId => "object_id",
            FieldType::Timestamp => "timestamp",
            FieldType::Null => "null",
            FieldType::Child => "child",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Ordering of one column inside an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldIndexOrdering {
    Ascending,
    Descending,
}

impl FieldIndexOrdering {
    pub fn is_ascending(&self) -> bool {
        matches!(self, FieldIndexOrdering::Ascending)
    }
}

impl fmt::Display for FieldIndexOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIndexOrdering::Ascending => write!(f, "asc"),
            FieldIndexOrdering::Descending => write!(f, "desc"),
        }
    }
}
