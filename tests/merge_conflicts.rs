//! Snapshot Merge Conflict Tests
//!
//! A mutable view opened on an older snapshot merges later against
//! whatever is committed by then. These tests pin down which concurrent
//! histories merge cleanly and which are rejected:
//! - identical changes merge idempotently
//! - same name with a different identifier (or vice versa) is a conflict
//! - removals of already removed elements are no-ops

use docrel::catalog::{DocPartView, FieldType, TableRef};
use docrel::mutable::{MutableCollection, MutableSnapshot};
use docrel::repository::{MergeError, MvccRepository};

// =============================================================================
// Helper Functions
// =============================================================================

/// A repository with one committed database "test" holding collection
/// "coll" with an empty root doc part.
fn seeded_repository() -> MvccRepository {
    let repository = MvccRepository::new();
    let mut changes = repository.mutable_snapshot();
    {
        let database = changes.add_database("test", "test_1").unwrap();
        let collection = database.add_collection("coll", "coll_1").unwrap();
        collection
            .add_doc_part(TableRef::root(), "doc_part_root")
            .unwrap();
    }
    repository.start_merge(&changes).unwrap().commit();
    repository
}

fn collection_mut<'a>(changes: &'a mut MutableSnapshot) -> &'a mut MutableCollection {
    changes
        .database_by_name_mut("test")
        .unwrap()
        .collection_by_name_mut("coll")
        .unwrap()
}

fn assert_unmergeable(error: MergeError) {
    assert!(matches!(error, MergeError::Unmergeable { .. }), "{error}");
}

// =============================================================================
// Database Level
// =============================================================================

/// Two stale views adding the same database merge one after the other.
#[test]
fn test_identical_database_add_is_idempotent() {
    let repository = MvccRepository::new();
    let mut first = repository.mutable_snapshot();
    first.add_database("app", "app_1").unwrap();
    let mut second = repository.mutable_snapshot();
    second.add_database("app", "app_1").unwrap();

    repository.start_merge(&first).unwrap().commit();
    repository.start_merge(&second).unwrap().commit();
    assert!(repository.snapshot().database_by_name("app").is_some());
}

/// Same database name with a different identifier cannot merge.
#[test]
fn test_database_name_collision_with_different_id() {
    let repository = MvccRepository::new();
    let mut first = repository.mutable_snapshot();
    first.add_database("app", "app_1").unwrap();
    let mut second = repository.mutable_snapshot();
    second.add_database("app", "app_2").unwrap();

    repository.start_merge(&first).unwrap().commit();
    assert_unmergeable(repository.start_merge(&second).unwrap_err());
}

/// Same database identifier under a different name cannot merge.
#[test]
fn test_database_id_collision_with_different_name() {
    let repository = MvccRepository::new();
    let mut first = repository.mutable_snapshot();
    first.add_database("app", "shared_id").unwrap();
    let mut second = repository.mutable_snapshot();
    second.add_database("analytics", "shared_id").unwrap();

    repository.start_merge(&first).unwrap().commit();
    assert_unmergeable(repository.start_merge(&second).unwrap_err());
}

/// Removing a database that another view already removed is a no-op.
#[test]
fn test_double_database_removal_merges() {
    let repository = seeded_repository();
    let mut first = repository.mutable_snapshot();
    assert!(first.remove_database_by_name("test"));
    let mut second = repository.mutable_snapshot();
    assert!(second.remove_database_by_name("test"));

    repository.start_merge(&first).unwrap().commit();
    repository.start_merge(&second).unwrap().commit();
    assert!(repository.snapshot().database_by_name("test").is_none());
}

// =============================================================================
// Collection Level
// =============================================================================

/// Same collection name with a different identifier cannot merge.
#[test]
fn test_collection_name_collision_with_different_id() {
    let repository = seeded_repository();
    let mut first = repository.mutable_snapshot();
    first
        .database_by_name_mut("test")
        .unwrap()
        .add_collection("orders", "orders_1")
        .unwrap();
    let mut second = repository.mutable_snapshot();
    second
        .database_by_name_mut("test")
        .unwrap()
        .add_collection("orders", "orders_2")
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    assert_unmergeable(repository.start_merge(&second).unwrap_err());
}

/// Same collection identifier under a different name cannot merge.
#[test]
fn test_collection_id_collision_with_different_name() {
    let repository = seeded_repository();
    let mut first = repository.mutable_snapshot();
    first
        .database_by_name_mut("test")
        .unwrap()
        .add_collection("orders", "shared_id")
        .unwrap();
    let mut second = repository.mutable_snapshot();
    second
        .database_by_name_mut("test")
        .unwrap()
        .add_collection("payments", "shared_id")
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    assert_unmergeable(repository.start_merge(&second).unwrap_err());
}

/// Disjoint collections added to the same database both survive.
#[test]
fn test_disjoint_collection_adds_union() {
    let repository = seeded_repository();
    let mut first = repository.mutable_snapshot();
    first
        .database_by_name_mut("test")
        .unwrap()
        .add_collection("orders", "orders_1")
        .unwrap();
    let mut second = repository.mutable_snapshot();
    second
        .database_by_name_mut("test")
        .unwrap()
        .add_collection("payments", "payments_1")
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    repository.start_merge(&second).unwrap().commit();

    let snapshot = repository.snapshot();
    let database = snapshot.database_by_name("test").unwrap();
    assert!(database.collection_by_name("coll").is_some());
    assert!(database.collection_by_name("orders").is_some());
    assert!(database.collection_by_name("payments").is_some());
}

// =============================================================================
// Doc Part Level
// =============================================================================

/// Same document path with a different doc part identifier cannot merge.
#[test]
fn test_doc_part_ref_collision_with_different_id() {
    let repository = seeded_repository();
    let child = TableRef::child(TableRef::root(), "addresses");
    let mut first = repository.mutable_snapshot();
    collection_mut(&mut first)
        .add_doc_part(child.clone(), "doc_part_addr_1")
        .unwrap();
    let mut second = repository.mutable_snapshot();
    collection_mut(&mut second)
        .add_doc_part(child, "doc_part_addr_2")
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    assert_unmergeable(repository.start_merge(&second).unwrap_err());
}

/// The same doc part added by both views merges idempotently.
#[test]
fn test_identical_doc_part_add_is_idempotent() {
    let repository = seeded_repository();
    let child = TableRef::child(TableRef::root(), "addresses");
    let mut first = repository.mutable_snapshot();
    collection_mut(&mut first)
        .add_doc_part(child.clone(), "doc_part_addr")
        .unwrap();
    let mut second = repository.mutable_snapshot();
    collection_mut(&mut second)
        .add_doc_part(child.clone(), "doc_part_addr")
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    repository.start_merge(&second).unwrap().commit();

    let snapshot = repository.snapshot();
    let collection = snapshot
        .database_by_name("test")
        .unwrap()
        .collection_by_name("coll")
        .unwrap();
    assert!(collection.doc_part_by_table_ref(&child).is_some());
}

// =============================================================================
// Field and Scalar Level
// =============================================================================

/// Same (name, type) pair with a different column identifier cannot merge.
#[test]
fn test_field_name_type_collision_with_different_id() {
    let repository = seeded_repository();
    let mut first = repository.mutable_snapshot();
    collection_mut(&mut first)
        .doc_part_by_table_ref_mut(&TableRef::root())
        .unwrap()
        .add_field("age", "age_i", FieldType::Integer)
        .unwrap();
    let mut second = repository.mutable_snapshot();
    collection_mut(&mut second)
        .doc_part_by_table_ref_mut(&TableRef::root())
        .unwrap()
        .add_field("age", "age_x", FieldType::Integer)
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    assert_unmergeable(repository.start_merge(&second).unwrap_err());
}

/// The same name under a different storage type is a different column
/// and merges fine.
#[test]
fn test_same_field_name_with_different_type_merges() {
    let repository = seeded_repository();
    let mut first = repository.mutable_snapshot();
    collection_mut(&mut first)
        .doc_part_by_table_ref_mut(&TableRef::root())
        .unwrap()
        .add_field("age", "age_i", FieldType::Integer)
        .unwrap();
    let mut second = repository.mutable_snapshot();
    collection_mut(&mut second)
        .doc_part_by_table_ref_mut(&TableRef::root())
        .unwrap()
        .add_field("age", "age_s", FieldType::String)
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    repository.start_merge(&second).unwrap().commit();

    let snapshot = repository.snapshot();
    let doc_part = snapshot
        .database_by_name("test")
        .unwrap()
        .collection_by_name("coll")
        .unwrap()
        .doc_part_by_table_ref(&TableRef::root())
        .unwrap();
    assert_eq!(doc_part.fields_by_name("age").len(), 2);
}

/// Same scalar type with a different column identifier cannot merge.
#[test]
fn test_scalar_type_collision_with_different_id() {
    let repository = seeded_repository();
    let tags = TableRef::child(TableRef::root(), "tags");
    {
        let mut changes = repository.mutable_snapshot();
        collection_mut(&mut changes)
            .add_doc_part(tags.clone(), "doc_part_tags")
            .unwrap();
        repository.start_merge(&changes).unwrap().commit();
    }

    let mut first = repository.mutable_snapshot();
    collection_mut(&mut first)
        .doc_part_by_table_ref_mut(&tags)
        .unwrap()
        .add_scalar("v_s", FieldType::String)
        .unwrap();
    let mut second = repository.mutable_snapshot();
    collection_mut(&mut second)
        .doc_part_by_table_ref_mut(&tags)
        .unwrap()
        .add_scalar("v_x", FieldType::String)
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    assert_unmergeable(repository.start_merge(&second).unwrap_err());
}

/// Scalars of different types merge side by side.
#[test]
fn test_scalars_of_different_types_merge() {
    let repository = seeded_repository();
    let tags = TableRef::child(TableRef::root(), "tags");
    {
        let mut changes = repository.mutable_snapshot();
        collection_mut(&mut changes)
            .add_doc_part(tags.clone(), "doc_part_tags")
            .unwrap();
        repository.start_merge(&changes).unwrap().commit();
    }

    let mut first = repository.mutable_snapshot();
    collection_mut(&mut first)
        .doc_part_by_table_ref_mut(&tags)
        .unwrap()
        .add_scalar("v_s", FieldType::String)
        .unwrap();
    let mut second = repository.mutable_snapshot();
    collection_mut(&mut second)
        .doc_part_by_table_ref_mut(&tags)
        .unwrap()
        .add_scalar("v_i", FieldType::Integer)
        .unwrap();

    repository.start_merge(&first).unwrap().commit();
    repository.start_merge(&second).unwrap().commit();

    let snapshot = repository.snapshot();
    let doc_part = snapshot
        .database_by_name("test")
        .unwrap()
        .collection_by_name("coll")
        .unwrap()
        .doc_part_by_table_ref(&tags)
        .unwrap();
    assert_eq!(doc_part.scalars().len(), 2);
}
