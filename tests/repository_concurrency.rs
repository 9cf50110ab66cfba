//! Repository Visibility and Concurrency Tests
//!
//! The repository gives readers immutable snapshots and serializes
//! commits through a single merge slot. These tests pin down:
//! - readers keep the snapshot they took, whatever commits later
//! - views opened on an old snapshot still merge when their changes
//!   do not collide with what was committed in between
//! - concurrent committers all land, one at a time

use std::sync::{Arc, Barrier};
use std::thread;

use docrel::catalog::TableRef;
use docrel::repository::{MergeError, MvccRepository};

// =============================================================================
// Snapshot Isolation
// =============================================================================

/// A snapshot taken before a commit never changes under the reader.
#[test]
fn test_reader_keeps_its_snapshot() {
    let repository = MvccRepository::new();
    let before = repository.snapshot();

    let mut changes = repository.mutable_snapshot();
    changes.add_database("app", "app_1").unwrap();
    repository.start_merge(&changes).unwrap().commit();

    assert!(before.database_by_name("app").is_none());
    assert!(repository.snapshot().database_by_name("app").is_some());
}

/// A mutable view is isolated: its additions stay invisible to the
/// repository until merged, and commits elsewhere stay invisible to it.
#[test]
fn test_mutable_view_is_isolated() {
    let repository = MvccRepository::new();
    let mut changes = repository.mutable_snapshot();
    changes.add_database("mine", "mine_1").unwrap();

    let mut other = repository.mutable_snapshot();
    other.add_database("theirs", "theirs_1").unwrap();
    repository.start_merge(&other).unwrap().commit();

    assert!(repository.snapshot().database_by_name("mine").is_none());
    assert!(changes.database_by_name("theirs").is_none());
}

// =============================================================================
// Stale Merges
// =============================================================================

/// A view opened before an unrelated commit still merges; both sets of
/// changes survive.
#[test]
fn test_stale_disjoint_view_merges() {
    let repository = MvccRepository::new();
    {
        let mut changes = repository.mutable_snapshot();
        changes.add_database("app", "app_1").unwrap();
        repository.start_merge(&changes).unwrap().commit();
    }

    let mut stale = repository.mutable_snapshot();
    stale
        .database_by_name_mut("app")
        .unwrap()
        .add_collection("users", "users_1")
        .unwrap();

    {
        let mut concurrent = repository.mutable_snapshot();
        concurrent
            .database_by_name_mut("app")
            .unwrap()
            .add_collection("orders", "orders_1")
            .unwrap();
        repository.start_merge(&concurrent).unwrap().commit();
    }

    repository.start_merge(&stale).unwrap().commit();
    let database = repository.snapshot().database_by_name("app").unwrap().clone();
    assert!(database.collection_by_name("users").is_some());
    assert!(database.collection_by_name("orders").is_some());
}

/// A stale view whose changes collide with a later commit is rejected,
/// and the repository is left untouched by the failed merge.
#[test]
fn test_stale_conflicting_view_is_rejected() {
    let repository = MvccRepository::new();
    let mut first = repository.mutable_snapshot();
    first.add_database("app", "app_1").unwrap();
    let mut second = repository.mutable_snapshot();
    second.add_database("app", "app_2").unwrap();

    repository.start_merge(&first).unwrap().commit();
    let error = repository.start_merge(&second).unwrap_err();
    assert!(matches!(error, MergeError::Unmergeable { .. }));

    let snapshot = repository.snapshot();
    assert_eq!(
        snapshot.database_by_name("app").unwrap().identifier(),
        "app_1"
    );
}

/// A view handed out by another repository never merges here.
#[test]
fn test_view_from_another_repository_is_rejected() {
    let repository = MvccRepository::new();
    let other = MvccRepository::new();
    let mut changes = other.mutable_snapshot();
    changes.add_database("app", "app_1").unwrap();

    assert_eq!(
        repository.start_merge(&changes).unwrap_err(),
        MergeError::ForeignSnapshot
    );
}

// =============================================================================
// Concurrent Committers
// =============================================================================

/// Many threads committing disjoint databases all land.
#[test]
fn test_concurrent_disjoint_commits_all_land() {
    const WRITERS: usize = 8;

    let repository = Arc::new(MvccRepository::new());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let repository = Arc::clone(&repository);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let name = format!("db_{}", writer);
                let identifier = format!("db_{}_id", writer);
                let mut changes = repository.mutable_snapshot();
                {
                    let database = changes.add_database(name, identifier).unwrap();
                    database
                        .add_collection("events", format!("events_{}", writer))
                        .unwrap()
                        .add_doc_part(TableRef::root(), format!("doc_part_{}", writer))
                        .unwrap();
                }
                barrier.wait();
                repository.start_merge(&changes).unwrap().commit();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = repository.snapshot();
    assert_eq!(snapshot.databases().count(), WRITERS);
    for writer in 0..WRITERS {
        let database = snapshot.database_by_name(&format!("db_{}", writer)).unwrap();
        assert!(database.collection_by_name("events").is_some());
    }
}
