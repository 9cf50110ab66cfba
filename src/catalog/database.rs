//! Databases: named sets of collections.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::collection::Collection;

/// An immutable database.
#[derive(Debug)]
pub struct Database {
    name: String,
    identifier: String,
    collections_by_name: HashMap<String, Arc<Collection>>,
    collections_by_identifier: HashMap<String, Arc<Collection>>,
}

impl Database {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn collections(&self) -> impl Iterator<Item = &Arc<Collection>> {
        self.collections_by_name.values()
    }

    pub fn collection_by_name(&self, name: &str) -> Option<&Arc<Collection>> {
        self.collections_by_name.get(name)
    }

    pub fn collection_by_identifier(&self, identifier: &str) -> Option<&Arc<Collection>> {
        self.collections_by_identifier.get(identifier)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "database {} ({})", self.name, self.identifier)
    }
}

/// Single-use builder for [`Database`].
pub struct DatabaseBuilder {
    name: String,
    identifier: String,
    collections: Vec<Arc<Collection>>,
}

impl DatabaseBuilder {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> DatabaseBuilder {
        DatabaseBuilder {
            name: name.into(),
            identifier: identifier.into(),
            collections: Vec::new(),
        }
    }

    pub fn from_database(other: &Database) -> DatabaseBuilder {
        DatabaseBuilder {
            name: other.name.clone(),
            identifier: other.identifier.clone(),
            collections: other.collections_by_name.values().cloned().collect(),
        }
    }

    /// Adds a collection, replacing any previous one with the same name.
    pub fn put_collection(mut self, collection: Arc<Collection>) -> DatabaseBuilder {
        self.collections
            .retain(|existing| existing.name() != collection.name());
        self.collections.push(collection);
        self
    }

    pub fn remove_collection(mut self, name: &str) -> DatabaseBuilder {
        self.collections.retain(|existing| existing.name() != name);
        self
    }

    pub fn build(self) -> Arc<Database> {
        let mut collections_by_name = HashMap::with_capacity(self.collections.len());
        let mut collections_by_identifier = HashMap::with_capacity(self.collections.len());
        for collection in self.collections {
            collections_by_identifier
                .insert(collection.identifier().to_string(), collection.clone());
            collections_by_name.insert(collection.name().to_string(), collection);
        }
        Arc::new(Database {
            name: self.name,
            identifier: self.identifier,
            collections_by_name,
            collections_by_identifier,
        })
    }
}
