//! The metadata repository: owner of the committed snapshot.
//!
//! Readers open a [`SnapshotStage`] and take immutable snapshots; they
//! are never blocked by writers. Writers take a mutable view from a
//! snapshot stage, accumulate changes and fold them back through a
//! two-step merge: [`MvccRepository::start_merge`] resolves the changes
//! against the current committed snapshot while holding the single
//! merge slot, and [`MergerStage::commit`] publishes the result.
//! Dropping a merger stage without committing abandons the merge.

mod errors;
mod merger;

pub use errors::{MergeError, MergeResult};
pub use merger::SnapshotMerger;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::catalog::Snapshot;
use crate::mutable::MutableSnapshot;
use crate::observability::Logger;

static NEXT_REPOSITORY_ID: AtomicU64 = AtomicU64::new(1);

/// Multiversion repository of catalog snapshots.
///
/// Holds exactly one committed snapshot at a time. Mutable views opened
/// on an older snapshot can still merge later, as long as their changes
/// do not collide with what was committed in between.
pub struct MvccRepository {
    /// Distinguishes repositories, so a view from one cannot merge into
    /// another.
    id: u64,
    current: RwLock<Arc<Snapshot>>,
    merge_lock: Mutex<()>,
}

impl MvccRepository {
    pub fn new() -> MvccRepository {
        MvccRepository::with_snapshot(Snapshot::empty())
    }

    pub fn with_snapshot(initial: Arc<Snapshot>) -> MvccRepository {
        MvccRepository {
            id: NEXT_REPOSITORY_ID.fetch_add(1, Ordering::Relaxed),
            current: RwLock::new(initial),
            merge_lock: Mutex::new(()),
        }
    }

    /// The current committed snapshot. Never waits for an in-flight
    /// merge; an uncommitted stage is invisible to readers.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().unwrap().clone()
    }

    /// Opens a mutable view on the current committed snapshot.
    pub fn mutable_snapshot(&self) -> MutableSnapshot {
        MutableSnapshot::with_origin(self.snapshot(), self.id)
    }

    /// Opens a read stage pinned to the current committed snapshot.
    /// Any number of snapshot stages may be open at once; they block
    /// neither each other nor an in-flight merge.
    pub fn start_snapshot_stage(&self) -> SnapshotStage<'_> {
        SnapshotStage {
            repository: self,
            snapshot: self.snapshot(),
        }
    }

    /// Resolves the changes of a mutable view against the current
    /// committed snapshot, which may be newer than the one the view was
    /// opened on. The returned stage holds the single merge slot until
    /// it is committed or dropped.
    pub fn start_merge<'a>(
        &'a self,
        changes: &MutableSnapshot,
    ) -> MergeResult<MergerStage<'a>> {
        if changes.origin() != Some(self.id) {
            return Err(MergeError::ForeignSnapshot);
        }
        let guard = self.merge_lock.lock().unwrap();
        let current = self.snapshot();
        let merged = SnapshotMerger::new(&current, changes)
            .merge()
            .inspect_err(|error| {
                Logger::warn("MERGE_CONFLICT", &[("error", &error.to_string())]);
            })?;
        Ok(MergerStage {
            repository: self,
            merged,
            _guard: guard,
        })
    }
}

impl Default for MvccRepository {
    fn default() -> MvccRepository {
        MvccRepository::new()
    }
}

/// A read session pinned to one committed snapshot.
pub struct SnapshotStage<'a> {
    repository: &'a MvccRepository,
    snapshot: Arc<Snapshot>,
}

impl SnapshotStage<'_> {
    /// The snapshot this stage was opened on. The returned `Arc` stays
    /// valid after the stage is dropped.
    pub fn immutable_snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.clone()
    }

    /// Opens a private mutable view on this stage's snapshot.
    pub fn mutable_snapshot(&self) -> MutableSnapshot {
        MutableSnapshot::with_origin(self.snapshot.clone(), self.repository.id)
    }
}

/// A resolved merge waiting to be committed.
///
/// Holds the merge slot of its repository, so no other merge can start
/// until this one commits or is dropped.
#[must_use = "a merger stage publishes nothing until committed"]
pub struct MergerStage<'a> {
    repository: &'a MvccRepository,
    merged: Arc<Snapshot>,
    _guard: MutexGuard<'a, ()>,
}

impl fmt::Debug for MergerStage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergerStage")
            .field("merged", &self.merged)
            .finish_non_exhaustive()
    }
}

impl MergerStage<'_> {
    /// The snapshot that `commit` would install.
    pub fn merged_snapshot(&self) -> &Arc<Snapshot> {
        &self.merged
    }

    /// Publishes the merged snapshot as the committed one.
    pub fn commit(self) {
        {
            let mut current = self.repository.current.write().unwrap();
            *current = self.merged.clone();
        }
        Logger::info(
            "SNAPSHOT_COMMIT",
            &[("databases", &self.merged.databases().count().to_string())],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableRef;

    #[test]
    fn test_commit_publishes_changes() {
        let repository = MvccRepository::new();
        let mut changes = repository.mutable_snapshot();
        changes.add_database("app", "app_1").unwrap();

        // Readers keep the old snapshot until commit.
        let stage = repository.start_merge(&changes).unwrap();
        assert!(repository.snapshot().database_by_name("app").is_none());
        stage.commit();
        assert!(repository.snapshot().database_by_name("app").is_some());
    }

    #[test]
    fn test_snapshot_stage_end_to_end() {
        use crate::catalog::{DocPartView, FieldType};

        let repository = MvccRepository::new();
        let mut changes = repository.start_snapshot_stage().mutable_snapshot();
        {
            let database = changes.add_database("db", "db_id").unwrap();
            let collection = database.add_collection("col", "col_id").unwrap();
            let doc_part = collection
                .add_doc_part(TableRef::root(), "doc_part_id")
                .unwrap();
            doc_part.add_field("x", "x_i", FieldType::Integer).unwrap();
        }
        repository.start_merge(&changes).unwrap().commit();

        let stage = repository.start_snapshot_stage();
        let snapshot = stage.immutable_snapshot();
        drop(stage);
        let field = snapshot
            .database_by_name("db")
            .unwrap()
            .collection_by_name("col")
            .unwrap()
            .doc_part_by_table_ref(&TableRef::root())
            .unwrap()
            .field_by_identifier("x_i")
            .unwrap();
        assert_eq!(field.field_type(), FieldType::Integer);
    }

    #[test]
    fn test_dropped_stage_publishes_nothing() {
        let repository = MvccRepository::new();
        let mut changes = repository.mutable_snapshot();
        changes.add_database("app", "app_1").unwrap();
        drop(repository.start_merge(&changes).unwrap());
        assert!(repository.snapshot().database_by_name("app").is_none());

        // The merge slot is free again.
        repository.start_merge(&changes).unwrap().commit();
        assert!(repository.snapshot().database_by_name("app").is_some());
    }

    #[test]
    fn test_foreign_snapshot_is_rejected() {
        let repository = MvccRepository::new();
        let other = MvccRepository::new();
        let changes = other.mutable_snapshot();
        assert_eq!(
            repository.start_merge(&changes).unwrap_err(),
            MergeError::ForeignSnapshot
        );
        // A view not handed out by any repository is foreign too.
        let detached = MutableSnapshot::new(Snapshot::empty());
        assert_eq!(
            repository.start_merge(&detached).unwrap_err(),
            MergeError::ForeignSnapshot
        );
    }

    #[test]
    fn test_disjoint_merges_union() {
        let repository = MvccRepository::new();

        let mut first = repository.mutable_snapshot();
        first.add_database("app", "app_1").unwrap();
        let mut second = repository.mutable_snapshot();
        second.add_database("analytics", "analytics_1").unwrap();

        repository.start_merge(&first).unwrap().commit();
        repository.start_merge(&second).unwrap().commit();

        let snapshot = repository.snapshot();
        assert!(snapshot.database_by_name("app").is_some());
        assert!(snapshot.database_by_name("analytics").is_some());
    }

    #[test]
    fn test_identical_change_merges_idempotently() {
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
        repository.start_merge(&stale).unwrap().commit();

        let mut same_again = repository.mutable_snapshot();
        same_again
            .database_by_name_mut("app")
            .unwrap()
            .collection_by_name_mut("users")
            .unwrap()
            .add_doc_part(TableRef::root(), "doc_part_root")
            .unwrap();
        repository.start_merge(&same_again).unwrap().commit();
        let snapshot = repository.snapshot();
        let collection = snapshot
            .database_by_name("app")
            .unwrap()
            .collection_by_name("users")
            .unwrap();
        assert!(collection.doc_part_by_table_ref(&TableRef::root()).is_some());
    }
}
