//! Leaf catalog entities: fields and scalars.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::FieldType;

/// A column of a doc part holding one (name, storage type) projection of a
/// document field.
///
/// `name` is the document-facing name and may repeat within a doc part
/// with different types; `identifier` is the physical column name and is
/// unique within the doc part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    name: String,
    identifier: String,
    field_type: FieldType,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        identifier: impl Into<String>,
        field_type: FieldType,
    ) -> Field {
        Field {
            name: name.into(),
            identifier: identifier.into(),
            field_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.identifier, self.field_type)
    }
}

/// The column storing direct scalar elements of an array doc part.
///
/// At most one scalar per storage type exists in a doc part; unlike a
/// `Field` it carries no document-facing name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scalar {
    identifier: String,
    field_type: FieldType,
}

impl Scalar {
    pub fn new(identifier: impl Into<String>, field_type: FieldType) -> Scalar {
        Scalar {
            identifier: identifier.into(),
            field_type,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scalar ({}): {}", self.identifier, self.field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_equality() {
        let a = Field::new("age", "age_i", FieldType::Integer);
        let b = Field::new("age", "age_i", FieldType::Integer);
        let c = Field::new("age", "age_s", FieldType::String);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_accessors() {
        let scalar = Scalar::new("v_d", FieldType::Double);
        assert_eq!(scalar.identifier(), "v_d");
        assert_eq!(scalar.field_type(), FieldType::Double);
    }
}
