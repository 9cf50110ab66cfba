//! Mutable views over the immutable catalog.
//!
//! A mutable snapshot wraps a committed snapshot and records additions,
//! modifications and removals per element without ever touching the
//! base. Parents learn about changes by polling their children's
//! `has_changed`; an element stored as unchanged whose child changed is
//! reported as modified. Freezing a view with `immutable_copy` rebuilds
//! only the changed subtrees and hands back shared `Arc`s for the rest.

mod collection;
mod database;
mod doc_part;
mod doc_part_index;
mod errors;
mod index;
mod snapshot;
mod state;

pub use collection::MutableCollection;
pub use database::MutableDatabase;
pub use doc_part::MutableDocPart;
pub use doc_part_index::MutableDocPartIndex;
pub use errors::{MutationError, MutationResult};
pub use index::MutableIndex;
pub use snapshot::MutableSnapshot;
pub use state::ElementState;
