//! Three-way merge of a mutable snapshot onto the current committed one.
//!
//! The merge folds only the changed elements of the mutable view onto
//! the (possibly newer) committed snapshot. Each level resolves its
//! element through both of its keys; when the two lookups disagree the
//! snapshots have diverged incompatibly and the merge fails. Changes
//! already present in the committed snapshot merge idempotently.

use std::sync::Arc;

use crate::catalog::{
    has_same_columns, Collection, CollectionBuilder, Database, DatabaseBuilder, DocPart,
    DocPartBuilder, DocPartIndex, DocPartIndexBuilder, DocPartIndexColumn, DocPartIndexView,
    DocPartView, Field, Index, IndexBuilder, IndexField, IndexView, Scalar, Snapshot,
    SnapshotBuilder,
};
use crate::mutable::{
    ElementState, MutableCollection, MutableDatabase, MutableDocPart, MutableIndex,
    MutableSnapshot,
};

use super::errors::{MergeError, MergeResult};

/// Entities resolved through two keys must resolve to the same object.
fn same_entity<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Merges the changes of one mutable snapshot onto a committed snapshot.
pub struct SnapshotMerger<'a> {
    old_snapshot: &'a Arc<Snapshot>,
    new_snapshot: &'a MutableSnapshot,
}

impl<'a> SnapshotMerger<'a> {
    pub fn new(old_snapshot: &'a Arc<Snapshot>, new_snapshot: &'a MutableSnapshot) -> Self {
        SnapshotMerger {
            old_snapshot,
            new_snapshot,
        }
    }

    pub fn merge(&self) -> MergeResult<Arc<Snapshot>> {
        let mut builder = SnapshotBuilder::from_snapshot(self.old_snapshot);
        for (database, state) in self.new_snapshot.modified_databases() {
            builder = self.merge_database(builder, database, state)?;
        }
        Ok(builder.build())
    }

    fn merge_database(
        &self,
        builder: SnapshotBuilder,
        new_db: &MutableDatabase,
        state: ElementState,
    ) -> MergeResult<SnapshotBuilder> {
        let by_name = self.old_snapshot.database_by_name(new_db.name());
        let by_id = self.old_snapshot.database_by_identifier(new_db.identifier());

        match state {
            ElementState::NotChanged | ElementState::NotExistent => {
                unreachable!("a modification was expected, but the state is {}", state)
            }
            ElementState::Added | ElementState::Modified => {
                if !same_entity(by_name, by_id) {
                    return Err(database_conflict(new_db, by_name, by_id));
                }
                let Some(base) = by_id else {
                    return Ok(builder.put_database(new_db.immutable_copy()));
                };
                let mut child = DatabaseBuilder::from_database(base);
                for (collection, state) in new_db.modified_collections() {
                    child = self.merge_collection(base, child, collection, state)?;
                }
                Ok(builder.put_database(child.build()))
            }
            ElementState::Removed => {
                if !same_entity(by_name, by_id) {
                    // A removal by identifier that resolves to a
                    // different name on the current snapshot would leave
                    // the catalog inconsistent.
                    return Err(database_conflict(new_db, by_name, by_id));
                }
                if by_name.is_none() {
                    // Already removed by another transaction, or created
                    // and removed within this one.
                    return Ok(builder);
                }
                Ok(builder.remove_database(new_db.name()))
            }
        }
    }

    fn merge_collection(
        &self,
        old_db: &Arc<Database>,
        builder: DatabaseBuilder,
        new_col: &MutableCollection,
        state: ElementState,
    ) -> MergeResult<DatabaseBuilder> {
        let by_name = old_db.collection_by_name(new_col.name());
        let by_id = old_db.collection_by_identifier(new_col.identifier());

        match state {
            ElementState::NotChanged | ElementState::NotExistent => {
                unreachable!("a modification was expected, but the state is {}", state)
            }
            ElementState::Added | ElementState::Modified => {
                if !same_entity(by_name, by_id) {
                    return Err(collection_conflict(old_db, new_col, by_name, by_id));
                }
                let Some(base) = by_id else {
                    return Ok(builder.put_collection(new_col.immutable_copy()));
                };
                let mut child = CollectionBuilder::from_collection(base);
                for doc_part in new_col.modified_doc_parts() {
                    child = self.merge_doc_part(old_db, new_col, base, child, doc_part)?;
                }
                for (index, state) in new_col.modified_indexes() {
                    child = self.merge_index(old_db, new_col, base, child, index, state)?;
                }
                Ok(builder.put_collection(child.build()))
            }
            ElementState::Removed => {
                if !same_entity(by_name, by_id) {
                    return Err(collection_conflict(old_db, new_col, by_name, by_id));
                }
                if by_name.is_none() {
                    return Ok(builder);
                }
                Ok(builder.remove_collection(new_col.name()))
            }
        }
    }

    fn merge_doc_part(
        &self,
        old_db: &Arc<Database>,
        new_col: &MutableCollection,
        old_col: &Arc<Collection>,
        builder: CollectionBuilder,
        changed: &MutableDocPart,
    ) -> MergeResult<CollectionBuilder> {
        let by_ref = old_col.doc_part_by_table_ref(changed.table_ref());
        let by_id = old_col.doc_part_by_identifier(changed.identifier());

        if !same_entity(by_ref, by_id) {
            return Err(doc_part_conflict(old_db, old_col, changed, by_ref, by_id));
        }
        let Some(base) = by_id else {
            return Ok(builder.put_doc_part(changed.immutable_copy()));
        };

        let mut child = DocPartBuilder::from_doc_part(base);
        for field in changed.added_fields() {
            child = self.merge_field(old_db, new_col, old_col, changed, base, child, field)?;
        }
        for scalar in changed.added_scalars() {
            child = self.merge_scalar(old_db, old_col, base, child, scalar)?;
        }
        for (doc_part_index, state) in changed.modified_indexes() {
            child = self.merge_doc_part_index(
                old_db,
                new_col,
                old_col,
                changed,
                base,
                child,
                doc_part_index,
                state,
            )?;
        }
        Ok(builder.put_doc_part(child.build()))
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_field(
        &self,
        old_db: &Arc<Database>,
        new_col: &MutableCollection,
        old_col: &Arc<Collection>,
        new_structure: &MutableDocPart,
        old_structure: &Arc<DocPart>,
        builder: DocPartBuilder,
        changed: &Field,
    ) -> MergeResult<DocPartBuilder> {
        let by_name_and_type =
            old_structure.field_by_name_and_type(changed.name(), changed.field_type());
        let by_id = old_structure.field_by_identifier(changed.identifier());

        if by_name_and_type != by_id {
            return Err(field_conflict(
                old_db,
                old_col,
                old_structure,
                changed,
                by_name_and_type,
                by_id,
            ));
        }
        if by_name_and_type.is_none() {
            if let Some(missed_index) = new_col.any_missed_index_for_new_field(
                old_col,
                new_structure,
                old_structure,
                changed,
            ) {
                return Err(MergeError::unmergeable(format!(
                    "there is a previous index on {}.{} whose name is {} associated with new \
                     field {}.{} and the corresponding doc part index has not been created",
                    old_db.name(),
                    old_col.name(),
                    missed_index,
                    old_structure.identifier(),
                    changed
                )));
            }
            return Ok(builder.put_field(changed.clone()));
        }
        Ok(builder)
    }

    fn merge_scalar(
        &self,
        old_db: &Arc<Database>,
        old_col: &Arc<Collection>,
        old_structure: &Arc<DocPart>,
        builder: DocPartBuilder,
        changed: &Scalar,
    ) -> MergeResult<DocPartBuilder> {
        let by_id = old_structure.scalar_by_identifier(changed.identifier());
        let by_type = old_structure.scalar_by_type(changed.field_type());

        if by_type != by_id {
            return Err(scalar_conflict(
                old_db,
                old_col,
                old_structure,
                changed,
                by_type,
                by_id,
            ));
        }
        if by_type.is_none() {
            return Ok(builder.put_scalar(changed.clone()));
        }
        Ok(builder)
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_doc_part_index(
        &self,
        old_db: &Arc<Database>,
        new_col: &MutableCollection,
        old_col: &Arc<Collection>,
        new_structure: &MutableDocPart,
        old_structure: &Arc<DocPart>,
        builder: DocPartBuilder,
        changed: &Arc<DocPartIndex>,
        state: ElementState,
    ) -> MergeResult<DocPartBuilder> {
        let by_id = old_structure.index_by_identifier(changed.identifier());
        let by_same_columns = old_structure
            .indexes()
            .find(|old_index| has_same_columns(&***old_index, &**changed));

        match state {
            ElementState::NotChanged | ElementState::NotExistent => {
                unreachable!("a modification was expected, but the state is {}", state)
            }
            ElementState::Added | ElementState::Modified => {
                if new_col
                    .any_related_index(old_col, new_structure, changed)
                    .is_none()
                {
                    return Err(MergeError::unmergeable(format!(
                        "there is a new doc part index {}.{}.{}.{} that has no index associated",
                        old_db.identifier(),
                        old_col.identifier(),
                        old_structure.identifier(),
                        changed.identifier()
                    )));
                }
                let Some(base) = by_id else {
                    return Ok(builder.put_index(changed.clone()));
                };
                let mut child = DocPartIndexBuilder::from_index(base);
                for column in changed.columns() {
                    child = self.merge_doc_part_index_column(
                        old_db,
                        old_col,
                        old_structure,
                        base,
                        child,
                        column,
                    )?;
                }
                Ok(builder.put_index(Arc::new(child.build())))
            }
            ElementState::Removed => {
                if let Some(missed_index) =
                    new_col.any_missed_index_for_removed_doc_part_index(old_col, changed)
                {
                    return Err(MergeError::unmergeable(format!(
                        "there is a previous index {} on {}.{} that is compatible with the \
                         removed doc part index {}.{}.{}.{}",
                        missed_index,
                        old_db.name(),
                        old_col.name(),
                        old_db.identifier(),
                        old_col.identifier(),
                        old_structure.identifier(),
                        changed.identifier()
                    )));
                }
                if by_id.is_none() || by_same_columns.is_none() {
                    // Already removed by another transaction, or created
                    // and removed within this one.
                    return Ok(builder);
                }
                Ok(builder.remove_index(changed.identifier()))
            }
        }
    }

    fn merge_doc_part_index_column(
        &self,
        old_db: &Arc<Database>,
        old_col: &Arc<Collection>,
        old_doc_part: &Arc<DocPart>,
        old_index: &Arc<DocPartIndex>,
        builder: DocPartIndexBuilder,
        changed: &DocPartIndexColumn,
    ) -> MergeResult<DocPartIndexBuilder> {
        let by_identifier = old_index.column_by_identifier(changed.identifier());
        let by_position = old_index.column_by_position(changed.position());

        if by_identifier != by_position {
            return Err(doc_part_index_column_conflict(
                old_db,
                old_col,
                old_doc_part,
                old_index,
                changed,
                by_identifier,
                by_position,
            ));
        }
        if by_identifier.is_none() {
            return Ok(builder.add_column(changed.clone()));
        }
        Ok(builder)
    }

    fn merge_index(
        &self,
        old_db: &Arc<Database>,
        new_col: &MutableCollection,
        old_col: &Arc<Collection>,
        builder: CollectionBuilder,
        changed: &MutableIndex,
        state: ElementState,
    ) -> MergeResult<CollectionBuilder> {
        let by_name = old_col.index_by_name(changed.name());

        match state {
            ElementState::NotChanged | ElementState::NotExistent => {
                unreachable!("a modification was expected, but the state is {}", state)
            }
            ElementState::Added | ElementState::Modified => {
                if let Some(conflicting) = new_col.any_conflicting_index(old_col, changed) {
                    return Err(MergeError::unmergeable(format!(
                        "there is a previous index {} on {}.{} that conflicts with new index {}",
                        conflicting,
                        old_db.name(),
                        old_col.name(),
                        changed.name()
                    )));
                }
                if let Some(doc_part) =
                    new_col.any_doc_part_with_missed_doc_part_index(old_col, changed)
                {
                    return Err(MergeError::unmergeable(format!(
                        "there should be a doc part index on {}.{}.{} associated only with new \
                         index {} that has not been created",
                        old_db.name(),
                        old_col.name(),
                        doc_part,
                        changed.name()
                    )));
                }
                let Some(base) = by_name else {
                    return Ok(builder.put_index(changed.immutable_copy()));
                };
                let mut child = IndexBuilder::from_index(base);
                for field in changed.added_fields() {
                    child = self.merge_index_field(old_db, old_col, base, child, field)?;
                }
                Ok(builder.put_index(Arc::new(child.build())))
            }
            ElementState::Removed => {
                if let Some(orphan) = new_col.any_orphan_doc_part_index(old_col, changed) {
                    return Err(MergeError::unmergeable(format!(
                        "there is a previous doc part index {} on {} associated only with \
                         removed index {} that has not been deleted",
                        orphan,
                        old_db.identifier(),
                        changed.name()
                    )));
                }
                if by_name.is_none() {
                    return Ok(builder);
                }
                Ok(builder.remove_index(changed.name()))
            }
        }
    }

    fn merge_index_field(
        &self,
        old_db: &Arc<Database>,
        old_col: &Arc<Collection>,
        old_index: &Arc<Index>,
        builder: IndexBuilder,
        changed: &IndexField,
    ) -> MergeResult<IndexBuilder> {
        let by_table_ref_and_name =
            old_index.field_by_table_ref_and_name(changed.table_ref(), changed.name());
        let by_position = old_index.field_by_position(changed.position());

        if by_table_ref_and_name != by_position {
            return Err(index_field_conflict(
                old_db,
                old_col,
                old_index,
                changed,
                by_table_ref_and_name,
                by_position,
            ));
        }
        if by_table_ref_and_name.is_none() {
            return Ok(builder.add_field(changed.clone()));
        }
        Ok(builder)
    }
}

// === Conflict error constructors ===

fn database_conflict(
    new_db: &MutableDatabase,
    by_name: Option<&Arc<Database>>,
    by_id: Option<&Arc<Database>>,
) -> MergeError {
    match (by_name, by_id) {
        (Some(by_name), _) => MergeError::unmergeable(format!(
            "there is a previous database whose name is {} that has a different id; the \
             previous id is {} and the new one is {}",
            by_name.name(),
            by_name.identifier(),
            new_db.identifier()
        )),
        (None, Some(by_id)) => MergeError::unmergeable(format!(
            "there is a previous database whose id is {} that has a different name; the \
             previous name is {} and the new one is {}",
            by_id.identifier(),
            by_id.name(),
            new_db.name()
        )),
        (None, None) => unreachable!("conflicting lookups cannot both be empty"),
    }
}

fn collection_conflict(
    old_db: &Arc<Database>,
    new_col: &MutableCollection,
    by_name: Option<&Arc<Collection>>,
    by_id: Option<&Arc<Collection>>,
) -> MergeError {
    match (by_name, by_id) {
        (Some(by_name), _) => MergeError::unmergeable(format!(
            "there is a previous collection on {} whose name is {} that has a different id; \
             the previous id is {} and the new one is {}",
            old_db.name(),
            by_name.name(),
            by_name.identifier(),
            new_col.identifier()
        )),
        (None, Some(by_id)) => MergeError::unmergeable(format!(
            "there is a previous collection on {} whose id is {} that has a different name; \
             the previous name is {} and the new one is {}",
            old_db.name(),
            by_id.identifier(),
            by_id.name(),
            new_col.name()
        )),
        (None, None) => unreachable!("conflicting lookups cannot both be empty"),
    }
}

fn doc_part_conflict(
    old_db: &Arc<Database>,
    old_col: &Arc<Collection>,
    changed: &MutableDocPart,
    by_ref: Option<&Arc<DocPart>>,
    by_id: Option<&Arc<DocPart>>,
) -> MergeError {
    match (by_ref, by_id) {
        (Some(by_ref), _) => MergeError::unmergeable(format!(
            "there is a previous doc part on {}.{} whose ref is '{}' that has a different id; \
             the previous id is {} and the new one is {}",
            old_db.name(),
            old_col.name(),
            by_ref.table_ref(),
            by_ref.identifier(),
            changed.identifier()
        )),
        (None, Some(by_id)) => MergeError::unmergeable(format!(
            "there is a previous doc part on {}.{} whose id is {} that has a different ref; \
             the previous ref is '{}' and the new one is '{}'",
            old_db.name(),
            old_col.name(),
            by_id.identifier(),
            by_id.table_ref(),
            changed.table_ref()
        )),
        (None, None) => unreachable!("conflicting lookups cannot both be empty"),
    }
}

fn field_conflict(
    old_db: &Arc<Database>,
    old_col: &Arc<Collection>,
    old_doc_part: &Arc<DocPart>,
    changed: &Field,
    by_name_and_type: Option<&Field>,
    by_id: Option<&Field>,
) -> MergeError {
    match (by_name_and_type, by_id) {
        (Some(previous), _) => MergeError::unmergeable(format!(
            "there is a previous field on doc part {}.{}.{} whose name is {} and type is {} \
             that has a different id; the previous id is {} and the new one is {}",
            old_db.name(),
            old_col.name(),
            old_doc_part.identifier(),
            previous.name(),
            previous.field_type(),
            previous.identifier(),
            changed.identifier()
        )),
        (None, Some(previous)) => MergeError::unmergeable(format!(
            "there is a previous field on doc part {}.{}.{} whose id is {} that has a \
             different name or type; the previous one is {} of type {} and the new one is {} \
             of type {}",
            old_db.identifier(),
            old_col.identifier(),
            old_doc_part.identifier(),
            previous.identifier(),
            previous.name(),
            previous.field_type(),
            changed.name(),
            changed.field_type()
        )),
        (None, None) => unreachable!("conflicting lookups cannot both be empty"),
    }
}

fn scalar_conflict(
    old_db: &Arc<Database>,
    old_col: &Arc<Collection>,
    old_doc_part: &Arc<DocPart>,
    changed: &Scalar,
    by_type: Option<&Scalar>,
    by_id: Option<&Scalar>,
) -> MergeError {
    match (by_type, by_id) {
        (Some(previous), _) => MergeError::unmergeable(format!(
            "there is a previous scalar on {}.{}.{} whose type is {} but its identifier is \
             {}; the identifier of the new one is {}",
            old_db.identifier(),
            old_col.identifier(),
            old_doc_part.identifier(),
            changed.field_type(),
            previous.identifier(),
            changed.identifier()
        )),
        (None, Some(previous)) => MergeError::unmergeable(format!(
            "there is a previous scalar on {}.{}.{} whose identifier is {} but its type is \
             {}; the type of the new one is {}",
            old_db.identifier(),
            old_col.identifier(),
            old_doc_part.identifier(),
            changed.identifier(),
            previous.field_type(),
            changed.field_type()
        )),
        (None, None) => unreachable!("conflicting lookups cannot both be empty"),
    }
}

#[allow(clippy::too_many_arguments)]
fn doc_part_index_column_conflict(
    old_db: &Arc<Database>,
    old_col: &Arc<Collection>,
    old_doc_part: &Arc<DocPart>,
    old_index: &Arc<DocPartIndex>,
    changed: &DocPartIndexColumn,
    by_identifier: Option<&DocPartIndexColumn>,
    by_position: Option<&DocPartIndexColumn>,
) -> MergeError {
    match (by_identifier, by_position) {
        (Some(previous), _) => MergeError::unmergeable(format!(
            "there is a previous column on doc part index {}.{}.{}.{} whose identifier is {} \
             that has a different position; the previous position is {} and the new one is {}",
            old_db.identifier(),
            old_col.identifier(),
            old_doc_part.identifier(),
            old_index.identifier(),
            previous.identifier(),
            previous.position(),
            changed.position()
        )),
        (None, Some(previous)) => MergeError::unmergeable(format!(
            "there is a previous column on doc part index {}.{}.{}.{} whose position is {} \
             that has a different identifier; the previous identifier is {} and the new one \
             is {}",
            old_db.identifier(),
            old_col.identifier(),
            old_doc_part.identifier(),
            old_index.identifier(),
            previous.position(),
            previous.identifier(),
            changed.identifier()
        )),
        (None, None) => unreachable!("conflicting lookups cannot both be empty"),
    }
}

fn index_field_conflict(
    old_db: &Arc<Database>,
    old_col: &Arc<Collection>,
    old_index: &Arc<Index>,
    changed: &IndexField,
    by_table_ref_and_name: Option<&IndexField>,
    by_position: Option<&IndexField>,
) -> MergeError {
    match (by_table_ref_and_name, by_position) {
        (Some(previous), _) => MergeError::unmergeable(format!(
            "there is a previous field on index {}.{}.{} at '{}' named {} that has a \
             different position; the previous position is {} and the new one is {}",
            old_db.name(),
            old_col.name(),
            old_index.name(),
            previous.table_ref(),
            previous.name(),
            previous.position(),
            changed.position()
        )),
        (None, Some(previous)) => MergeError::unmergeable(format!(
            "there is a previous field on index {}.{}.{} whose position is {} that has a \
             different path or name; the previous one is '{}'.{} and the new one is '{}'.{}",
            old_db.name(),
            old_col.name(),
            old_index.name(),
            previous.position(),
            previous.table_ref(),
            previous.name(),
            changed.table_ref(),
            changed.name()
        )),
        (None, None) => unreachable!("conflicting lookups cannot both be empty"),
    }
}
